use crate::config::{PROGRESS_MAX, SPL_OFFSET, WINDOW_MS};
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Render surface contract. Implementations run on the display thread only;
/// the capture side never calls these directly.
pub trait DisplaySink: Send {
    fn set_current_level_text(&mut self, text: &str);
    fn set_progress(&mut self, progress: i32);
    fn set_min_text(&mut self, text: &str);
    fn set_max_text(&mut self, text: &str);
}

/// Commands marshalled from the capture thread to the display thread.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    Level { text: String, progress: i32 },
    Range { min: String, max: String },
    Status(String),
    Clear,
    Shutdown,
}

/// Spawns the display thread that owns the sink and applies incoming
/// commands until `Shutdown` (or sender disconnect).
pub fn spawn_display_thread(
    mut sink: Box<dyn DisplaySink>,
) -> (mpsc::Sender<DisplayCommand>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<DisplayCommand>();

    let handle = std::thread::spawn(move || {
        while let Ok(command) = rx.recv() {
            if matches!(command, DisplayCommand::Shutdown) {
                break;
            }
            apply_command(sink.as_mut(), command);
        }
    });

    (tx, handle)
}

pub(crate) fn apply_command(sink: &mut dyn DisplaySink, command: DisplayCommand) {
    match command {
        DisplayCommand::Level { text, progress } => {
            sink.set_current_level_text(&text);
            sink.set_progress(progress);
        }
        DisplayCommand::Range { min, max } => {
            sink.set_min_text(&min);
            sink.set_max_text(&max);
        }
        DisplayCommand::Status(text) => sink.set_current_level_text(&text),
        DisplayCommand::Clear => {
            sink.set_current_level_text("Stopped");
            sink.set_progress(0);
        }
        DisplayCommand::Shutdown => {}
    }
}

/// Formats a dBFS level as the estimated SPL-like display text.
pub fn level_text(level_db: f64) -> String {
    format!("{:.1} ~dB", level_db + SPL_OFFSET)
}

/// Progress bar position for a dBFS level, clamped to the bar's range.
pub fn progress_value(level_db: f64) -> i32 {
    ((level_db + SPL_OFFSET) as i32).clamp(0, PROGRESS_MAX)
}

pub fn min_text(level_db: Option<f64>) -> String {
    range_text("Min", level_db)
}

pub fn max_text(level_db: Option<f64>) -> String {
    range_text("Max", level_db)
}

fn range_text(label: &str, level_db: Option<f64>) -> String {
    let window_secs = WINDOW_MS / 1000;
    match level_db {
        Some(db) => format!("{} ({}s): {:.1}", label, window_secs, db + SPL_OFFSET),
        None => format!("{} ({}s): --", label, window_secs),
    }
}
