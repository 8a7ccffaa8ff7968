use crate::config::{CHANNELS, SAMPLE_RATE};
use crate::error::{MeterError, MeterResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a blocking read waits for samples before reporting an empty
/// read. Bounds stop latency to one read.
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Generic driver failure code surfaced through `ReadOutcome::Error`.
const ERROR_DEVICE: i32 = -1;

/// At most two seconds of queued mono samples; a stalled reader loses the
/// oldest audio instead of growing the queue forever.
const QUEUE_CAP: usize = SAMPLE_RATE as usize * 2;

/// Result of one blocking read: samples delivered, nothing available yet,
/// or a device/driver error code (always negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Samples(usize),
    Empty,
    Error(i32),
}

/// An opened input handle. Created fresh per capture session and consumed
/// on the capture thread; never reused after `stop`.
pub trait AudioInput {
    fn start(&mut self) -> MeterResult<()>;
    fn read(&mut self, buf: &mut [i16]) -> ReadOutcome;
    fn is_active(&self) -> bool;
    /// Stops and releases the device. Idempotent: a second call only logs.
    fn stop(&mut self);
}

/// Factory side of the input collaborator.
pub trait AudioBackend: Send + Sync {
    /// Minimum usable read size in samples, or an error when no input
    /// device is usable.
    fn min_buffer_size(&self) -> MeterResult<usize>;
    fn open(&self, buffer_size: usize) -> MeterResult<Box<dyn AudioInput>>;
}

/// Production backend over cpal. Captures at the device's native channel
/// count, downmixes to mono i16 at 44.1 kHz in the stream callback.
pub struct CpalBackend {
    input_device: Option<String>,
}

impl CpalBackend {
    pub fn new(input_device: Option<String>) -> Self {
        Self { input_device }
    }

    fn find_device(&self) -> MeterResult<cpal::Device> {
        let host = cpal::default_host();
        match &self.input_device {
            Some(name) => host
                .input_devices()
                .map_err(|e| MeterError::DeviceInit(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| MeterError::DeviceInit(format!("Input device '{}' not found", name))),
            None => host
                .default_input_device()
                .ok_or_else(|| MeterError::DeviceInit("No input device available".to_string())),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn min_buffer_size(&self) -> MeterResult<usize> {
        // cpal has no AudioRecord-style minimum query; 100ms of samples is
        // comfortably above every host's callback quantum.
        self.find_device()?;
        Ok((SAMPLE_RATE as usize / 10) * CHANNELS as usize)
    }

    fn open(&self, _buffer_size: usize) -> MeterResult<Box<dyn AudioInput>> {
        let device = self.find_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| MeterError::DeviceInit(e.to_string()))?;
        let channels = default_config.channels() as usize;
        let sample_format = default_config.sample_format();

        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(InputShared::new());

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let data_shared = Arc::clone(&shared);
                let err_shared = Arc::clone(&shared);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        data_shared.push_mono(data.chunks(channels).map(|frame| {
                            let avg = frame.iter().sum::<f32>() / channels as f32;
                            (avg * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
                        }));
                    },
                    move |err| err_shared.flag_error(err),
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let data_shared = Arc::clone(&shared);
                let err_shared = Arc::clone(&shared);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        data_shared.push_mono(data.chunks(channels).map(|frame| {
                            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                            (sum / channels as i32) as i16
                        }));
                    },
                    move |err| err_shared.flag_error(err),
                    None,
                )
            }
            other => {
                return Err(MeterError::DeviceInit(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        }
        .map_err(|e| MeterError::DeviceInit(e.to_string()))?;

        Ok(Box::new(CpalInput {
            stream: Some(stream),
            shared,
        }))
    }
}

/// State shared between the cpal callback and the blocking reader.
struct InputShared {
    queue: Mutex<VecDeque<i16>>,
    available: Condvar,
    error_code: AtomicI32,
    active: AtomicBool,
}

impl InputShared {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            error_code: AtomicI32::new(0),
            active: AtomicBool::new(false),
        }
    }

    fn push_mono(&self, samples: impl Iterator<Item = i16>) {
        let mut queue = self.queue.lock();
        queue.extend(samples);
        let excess = queue.len().saturating_sub(QUEUE_CAP);
        if excess > 0 {
            queue.drain(..excess);
        }
        self.available.notify_one();
    }

    fn flag_error(&self, err: cpal::StreamError) {
        log::error!("Audio stream error: {}", err);
        self.error_code.store(ERROR_DEVICE, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.available.notify_all();
    }
}

pub struct CpalInput {
    stream: Option<Stream>,
    shared: Arc<InputShared>,
}

impl AudioInput for CpalInput {
    fn start(&mut self) -> MeterResult<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| MeterError::DeviceInit("Input stream already released".to_string()))?;
        stream
            .play()
            .map_err(|e| MeterError::DeviceInit(e.to_string()))?;
        self.shared.active.store(true, Ordering::Release);
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> ReadOutcome {
        if buf.is_empty() {
            return ReadOutcome::Empty;
        }

        let mut queue = self.shared.queue.lock();
        loop {
            let code = self.shared.error_code.load(Ordering::Acquire);
            if code != 0 {
                return ReadOutcome::Error(code);
            }
            if !queue.is_empty() {
                break;
            }
            if !self.shared.active.load(Ordering::Acquire) {
                return ReadOutcome::Empty;
            }
            let timed_out = self
                .shared
                .available
                .wait_for(&mut queue, READ_TIMEOUT)
                .timed_out();
            if timed_out && queue.is_empty() {
                // No data inside the timeout: a zero-length read, not an error.
                return ReadOutcome::Empty;
            }
        }

        let count = buf.len().min(queue.len());
        for (slot, sample) in buf.iter_mut().zip(queue.drain(..count)) {
            *slot = sample;
        }
        ReadOutcome::Samples(count)
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.available.notify_all();

        match self.stream.take() {
            Some(stream) => {
                if let Err(e) = stream.pause() {
                    log::warn!("Failed to pause input stream: {}", e);
                }
                drop(stream);
                log::debug!("Audio input stopped and released");
            }
            // Already released; the end state is the one we wanted.
            None => log::warn!("Ignoring redundant stop of a released audio input"),
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.stop();
        }
    }
}
