use crate::config::DB_FLOOR;
use parking_lot::Mutex;

struct Pending {
    levels: Vec<f64>,
    last_emit_ms: u64,
}

/// Collects per-block levels and reduces them to one value per display
/// interval. The reduction is peak-hold (max), not an average, so short
/// noise spikes stay visible instead of being smoothed away.
pub struct IntervalAggregator {
    interval_ms: u64,
    pending: Mutex<Pending>,
}

impl IntervalAggregator {
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            pending: Mutex::new(Pending {
                levels: Vec::new(),
                last_emit_ms: now_ms,
            }),
        }
    }

    pub fn record(&self, level_db: f64) {
        self.pending.lock().levels.push(level_db);
    }

    /// Checks the interval timer. When the interval has elapsed, swaps out
    /// the accumulated levels and returns their maximum. An interval with no
    /// samples produces nothing but still advances the timer.
    pub fn tick(&self, now_ms: u64) -> Option<f64> {
        let drained = {
            let mut pending = self.pending.lock();
            if now_ms.saturating_sub(pending.last_emit_ms) < self.interval_ms {
                return None;
            }
            pending.last_emit_ms = now_ms;
            std::mem::take(&mut pending.levels)
        };

        if drained.is_empty() {
            return None;
        }
        Some(drained.into_iter().reduce(f64::max).unwrap_or(DB_FLOOR))
    }
}
