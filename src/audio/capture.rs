use crate::audio::device::{AudioBackend, AudioInput, ReadOutcome};
use crate::audio::levels::block_level_db;
use crate::config::{UPDATE_INTERVAL_MS, WINDOW_MS};
use crate::display::{self, DisplayCommand};
use crate::error::{MeterError, MeterResult};
use crate::meter::aggregator::IntervalAggregator;
use crate::meter::window::{RangeWindow, Reading};
use crate::state::{MeterState, SharedState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;

/// One capture session: a fresh device handle plus the thread that runs the
/// read-compute-aggregate loop. A stopped session is never restarted; the
/// owner builds a new one.
pub struct CaptureSession {
    capturing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Spawns the capture thread. Device acquisition happens on that thread;
    /// an initialization failure lands in `MeterState::Failed` and on the
    /// display instead of panicking the caller.
    pub fn start(
        backend: Arc<dyn AudioBackend>,
        state: SharedState,
        display_tx: mpsc::Sender<DisplayCommand>,
    ) -> Self {
        let capturing = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&capturing);

        let thread = std::thread::spawn(move || {
            if let Err(e) = run_session(backend.as_ref(), &flag, &state, &display_tx) {
                log::error!("Capture session failed to start: {}", e);
                flag.store(false, Ordering::Release);
                state.lock().meter_state = MeterState::Failed {
                    message: e.to_string(),
                };
                let _ = display_tx.send(DisplayCommand::Status(e.to_string()));
            }
        });

        Self {
            capturing,
            thread: Some(thread),
        }
    }

    /// Cooperative stop: clear the flag first so the loop exits at its next
    /// read boundary, join (the read is bounded by its timeout), then reset
    /// the display to the neutral state.
    pub fn stop(&mut self, display_tx: &mpsc::Sender<DisplayCommand>) {
        self.capturing.store(false, Ordering::Release);
        match self.thread.take() {
            Some(thread) => {
                if thread.join().is_err() {
                    log::error!("Capture thread panicked");
                }
            }
            None => log::warn!("Capture session already stopped"),
        }
        let _ = display_tx.send(DisplayCommand::Clear);
    }
}

fn run_session(
    backend: &dyn AudioBackend,
    capturing: &AtomicBool,
    state: &SharedState,
    display_tx: &mpsc::Sender<DisplayCommand>,
) -> MeterResult<()> {
    let block_len = backend.min_buffer_size()?;
    let mut input = backend.open(block_len)?;
    input.start()?;

    state.lock().meter_state = MeterState::Capturing;
    let _ = display_tx.send(DisplayCommand::Status("Listening...".to_string()));

    let epoch = Instant::now();
    run_loop(input.as_mut(), block_len, capturing, state, display_tx, || {
        epoch.elapsed().as_millis() as u64
    });
    Ok(())
}

/// The continuous read-compute-aggregate cycle. Factored out of the session
/// setup so the clock and device can be driven directly.
fn run_loop(
    input: &mut dyn AudioInput,
    block_len: usize,
    capturing: &AtomicBool,
    state: &SharedState,
    display_tx: &mpsc::Sender<DisplayCommand>,
    mut now_ms: impl FnMut() -> u64,
) {
    let mut block = vec![0i16; block_len];
    let aggregator = IntervalAggregator::new(UPDATE_INTERVAL_MS, now_ms());
    let window = RangeWindow::new(WINDOW_MS);

    while capturing.load(Ordering::Acquire) && input.is_active() {
        match input.read(&mut block) {
            ReadOutcome::Samples(count) => {
                aggregator.record(block_level_db(&block[..count]));

                let now = now_ms();
                if let Some(peak) = aggregator.tick(now) {
                    let (min, max) = window.record_and_query(
                        Reading {
                            timestamp_ms: now,
                            level_db: peak,
                        },
                        now,
                    );
                    let _ = display_tx.send(DisplayCommand::Level {
                        text: display::level_text(peak),
                        progress: display::progress_value(peak),
                    });
                    let _ = display_tx.send(DisplayCommand::Range {
                        min: display::min_text(min),
                        max: display::max_text(max),
                    });
                }
            }
            // Nothing available right now; not an error.
            ReadOutcome::Empty => continue,
            ReadOutcome::Error(code) => {
                let error = MeterError::DeviceRead { code };
                log::error!("{}", error);
                capturing.store(false, Ordering::Release);
                state.lock().meter_state = MeterState::Stopped;
                let _ = display_tx.send(DisplayCommand::Status(error.to_string()));
                input.stop();
                return;
            }
        }
    }

    input.stop();
    let mut app = state.lock();
    if app.meter_state == MeterState::Capturing {
        app.meter_state = MeterState::Stopped;
    }
}
