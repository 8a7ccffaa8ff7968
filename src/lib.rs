pub mod audio;
pub mod config;
pub mod display;
pub mod error;
pub mod meter;
pub mod permission;
pub mod state;

use audio::capture::CaptureSession;
use audio::device::AudioBackend;
use display::DisplayCommand;
use permission::{PermissionDecision, PermissionGate};
use state::{AppState, MeterState, SharedState};
use std::sync::{mpsc, Arc};

/// Owns the meter lifecycle: the permission check, at most one live capture
/// session, and the shared state the display layer can snapshot.
pub struct Meter {
    backend: Arc<dyn AudioBackend>,
    permission: Box<dyn PermissionGate>,
    display_tx: mpsc::Sender<DisplayCommand>,
    state: SharedState,
    session: Option<CaptureSession>,
}

impl Meter {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        permission: Box<dyn PermissionGate>,
        display_tx: mpsc::Sender<DisplayCommand>,
    ) -> Self {
        Self {
            backend,
            permission,
            display_tx,
            state: Arc::new(parking_lot::Mutex::new(AppState::default())),
            session: None,
        }
    }

    /// Starts capturing, requesting microphone access first if needed. A
    /// denied request surfaces on the display and leaves the meter stopped;
    /// the user has to trigger a fresh start to retry.
    pub fn start(&mut self) {
        if self.session.is_some() {
            if self.state.lock().meter_state == MeterState::Capturing {
                log::debug!("Meter already capturing");
                return;
            }
            // The session ended on its own (init failure or read error);
            // reap it so the restart gets a fresh device handle.
            self.stop();
        }

        if self.permission.is_granted() {
            self.begin_capture();
            return;
        }

        let decision = self.permission.request();
        match decision.recv() {
            Ok(PermissionDecision::Granted) => self.begin_capture(),
            Ok(PermissionDecision::Denied) | Err(_) => {
                let error = error::MeterError::PermissionDenied;
                log::warn!("{}", error);
                self.state.lock().meter_state = MeterState::Failed {
                    message: error.to_string(),
                };
                let _ = self
                    .display_tx
                    .send(DisplayCommand::Status(error.to_string()));
            }
        }
    }

    /// Stops the live session: flag down, thread joined, device released,
    /// display reset. Safe to call when already stopped.
    pub fn stop(&mut self) {
        match self.session.take() {
            Some(mut session) => session.stop(&self.display_tx),
            None => log::debug!("Meter already stopped"),
        }
    }

    pub fn state(&self) -> MeterState {
        self.state.lock().meter_state.clone()
    }

    fn begin_capture(&mut self) {
        // Each start gets a fresh session and a fresh device handle.
        self.session = Some(CaptureSession::start(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            self.display_tx.clone(),
        ));
    }
}

impl Drop for Meter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{AudioInput, ReadOutcome};
    use crate::error::{MeterError, MeterResult};
    use std::time::Duration;

    /// Backend whose input never produces samples; the loop idles on empty
    /// reads until stopped.
    struct IdleBackend;

    struct IdleInput;

    impl AudioInput for IdleInput {
        fn start(&mut self) -> MeterResult<()> {
            Ok(())
        }
        fn read(&mut self, _buf: &mut [i16]) -> ReadOutcome {
            std::thread::sleep(Duration::from_millis(1));
            ReadOutcome::Empty
        }
        fn is_active(&self) -> bool {
            true
        }
        fn stop(&mut self) {}
    }

    impl AudioBackend for IdleBackend {
        fn min_buffer_size(&self) -> MeterResult<usize> {
            Ok(64)
        }
        fn open(&self, _buffer_size: usize) -> MeterResult<Box<dyn AudioInput>> {
            Ok(Box::new(IdleInput))
        }
    }

    struct DeniedGate;

    impl PermissionGate for DeniedGate {
        fn is_granted(&self) -> bool {
            false
        }
        fn request(&mut self) -> mpsc::Receiver<PermissionDecision> {
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(PermissionDecision::Denied);
            rx
        }
    }

    fn wait_for_state(meter: &Meter, wanted: &MeterState) -> bool {
        for _ in 0..200 {
            if &meter.state() == wanted {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_denied_permission_fails_without_capturing() {
        let (tx, rx) = mpsc::channel();
        let mut meter = Meter::new(Arc::new(IdleBackend), Box::new(DeniedGate), tx);
        meter.start();

        assert_eq!(
            meter.state(),
            MeterState::Failed {
                message: "Microphone permission not granted".into()
            }
        );
        match rx.try_recv() {
            Ok(DisplayCommand::Status(text)) => {
                assert_eq!(text, "Microphone permission not granted")
            }
            other => panic!("expected a status command, got {:?}", other),
        }
    }

    #[test]
    fn test_start_then_stop_round_trip() {
        let (tx, rx) = mpsc::channel();
        let mut meter = Meter::new(
            Arc::new(IdleBackend),
            Box::new(permission::AlwaysGranted),
            tx,
        );

        meter.start();
        assert!(
            wait_for_state(&meter, &MeterState::Capturing),
            "capture thread never reached Capturing"
        );

        meter.stop();
        assert_eq!(meter.state(), MeterState::Stopped);

        let mut commands = Vec::new();
        while let Ok(c) = rx.try_recv() {
            commands.push(c);
        }
        assert!(matches!(commands.first(), Some(DisplayCommand::Status(_))));
        assert!(matches!(commands.last(), Some(DisplayCommand::Clear)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (tx, _rx) = mpsc::channel();
        let mut meter = Meter::new(
            Arc::new(IdleBackend),
            Box::new(permission::AlwaysGranted),
            tx,
        );
        meter.stop();
        meter.stop();
        assert_eq!(meter.state(), MeterState::Idle);
    }

    #[test]
    fn test_restart_recovers_from_init_failure() {
        use std::sync::atomic::{AtomicBool, Ordering};

        /// Fails the first acquisition, succeeds afterwards.
        struct FlakyBackend {
            failed_once: AtomicBool,
        }

        impl AudioBackend for FlakyBackend {
            fn min_buffer_size(&self) -> MeterResult<usize> {
                if !self.failed_once.swap(true, Ordering::SeqCst) {
                    return Err(MeterError::DeviceInit("device busy".into()));
                }
                Ok(64)
            }
            fn open(&self, _buffer_size: usize) -> MeterResult<Box<dyn AudioInput>> {
                Ok(Box::new(IdleInput))
            }
        }

        let (tx, _rx) = mpsc::channel();
        let mut meter = Meter::new(
            Arc::new(FlakyBackend {
                failed_once: AtomicBool::new(false),
            }),
            Box::new(permission::AlwaysGranted),
            tx,
        );

        meter.start();
        let failed = MeterState::Failed {
            message: "Audio input initialization failed: device busy".into(),
        };
        assert!(wait_for_state(&meter, &failed), "first start should fail");

        meter.start();
        assert!(
            wait_for_state(&meter, &MeterState::Capturing),
            "retry after failure should capture"
        );
        meter.stop();
    }

    #[test]
    fn test_restart_after_stop_uses_fresh_session() {
        let (tx, _rx) = mpsc::channel();
        let mut meter = Meter::new(
            Arc::new(IdleBackend),
            Box::new(permission::AlwaysGranted),
            tx,
        );

        meter.start();
        assert!(wait_for_state(&meter, &MeterState::Capturing));
        meter.stop();
        assert_eq!(meter.state(), MeterState::Stopped);

        meter.start();
        assert!(
            wait_for_state(&meter, &MeterState::Capturing),
            "restart never reached Capturing"
        );
        meter.stop();
    }
}
