use parking_lot::Mutex;
use std::collections::VecDeque;

/// One aggregated loudness reading, stamped with session-relative
/// monotonic milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp_ms: u64,
    pub level_db: f64,
}

/// Time-ordered deque of readings answering "min/max over the trailing
/// window". Readings arrive in non-decreasing timestamp order, so eviction
/// only ever happens at the head. The window tops out around
/// window/interval entries (~80 here), so a linear min/max scan is fine.
pub struct RangeWindow {
    window_ms: u64,
    readings: Mutex<VecDeque<Reading>>,
}

impl RangeWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            readings: Mutex::new(VecDeque::new()),
        }
    }

    /// Inserts a reading, evicts everything older than the window, and
    /// returns (min, max) over what remains. One critical section end to end.
    pub fn record_and_query(&self, reading: Reading, now_ms: u64) -> (Option<f64>, Option<f64>) {
        let mut readings = self.readings.lock();
        readings.push_back(reading);
        Self::evict_and_scan(&mut readings, self.window_ms, now_ms)
    }

    /// Min/max over the trailing window without inserting anything.
    pub fn query(&self, now_ms: u64) -> (Option<f64>, Option<f64>) {
        let mut readings = self.readings.lock();
        Self::evict_and_scan(&mut readings, self.window_ms, now_ms)
    }

    fn evict_and_scan(
        readings: &mut VecDeque<Reading>,
        window_ms: u64,
        now_ms: u64,
    ) -> (Option<f64>, Option<f64>) {
        let cutoff = now_ms.saturating_sub(window_ms);
        while readings.front().map_or(false, |r| r.timestamp_ms < cutoff) {
            readings.pop_front();
        }

        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        for reading in readings.iter() {
            min = Some(min.map_or(reading.level_db, |m| m.min(reading.level_db)));
            max = Some(max.map_or(reading.level_db, |m| m.max(reading.level_db)));
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(timestamp_ms: u64, level_db: f64) -> Reading {
        Reading {
            timestamp_ms,
            level_db,
        }
    }

    #[test]
    fn test_empty_window_has_no_range() {
        let window = RangeWindow::new(40_000);
        assert_eq!(window.query(0), (None, None));
    }

    #[test]
    fn test_single_reading_is_both_min_and_max() {
        let window = RangeWindow::new(40_000);
        let range = window.record_and_query(reading(100, -30.0), 100);
        assert_eq!(range, (Some(-30.0), Some(-30.0)));
    }

    #[test]
    fn test_evicts_readings_older_than_window() {
        let window = RangeWindow::new(40_000);
        window.record_and_query(reading(0, -30.0), 0);
        window.record_and_query(reading(39_000, -10.0), 39_000);
        // At t=41000 the cutoff is 1000: t=0 falls out, t=39000 stays.
        let range = window.record_and_query(reading(41_000, -50.0), 41_000);
        assert_eq!(range, (Some(-50.0), Some(-10.0)));
    }

    #[test]
    fn test_reading_exactly_at_cutoff_survives() {
        let window = RangeWindow::new(40_000);
        window.record_and_query(reading(1_000, -20.0), 1_000);
        let range = window.record_and_query(reading(41_000, -5.0), 41_000);
        assert_eq!(range, (Some(-20.0), Some(-5.0)));
    }

    #[test]
    fn test_query_is_idempotent() {
        let window = RangeWindow::new(40_000);
        window.record_and_query(reading(500, -12.0), 500);
        window.record_and_query(reading(1_000, -48.0), 1_000);
        let first = window.query(1_000);
        let second = window.query(1_000);
        assert_eq!(first, second);
        assert_eq!(first, (Some(-48.0), Some(-12.0)));
    }

    #[test]
    fn test_window_can_empty_out_after_long_pause() {
        let window = RangeWindow::new(40_000);
        window.record_and_query(reading(0, -30.0), 0);
        assert_eq!(window.query(100_000), (None, None));
    }
}
