use thiserror::Error;

pub type MeterResult<T> = Result<T, MeterError>;

/// Failures that end (or prevent) a capture session. A redundant device
/// stop/release is not represented here: the device layer logs it and moves
/// on, since the end state is already the released one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeterError {
    #[error("Microphone permission not granted")]
    PermissionDenied,

    #[error("Audio input initialization failed: {0}")]
    DeviceInit(String),

    #[error("Audio read error ({code})")]
    DeviceRead { code: i32 },
}
