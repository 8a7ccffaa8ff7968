use anyhow::Result;
use dbmeter::audio::device::CpalBackend;
use dbmeter::config;
use dbmeter::display::{spawn_display_thread, DisplayCommand, DisplaySink};
use dbmeter::permission::AlwaysGranted;
use dbmeter::Meter;
use std::io::Write;
use std::sync::Arc;

const BAR_WIDTH: usize = 30;

/// Single-line terminal rendering of the display contract: level text,
/// progress bar, rolling min/max.
struct TerminalDisplay {
    level: String,
    progress: i32,
    min: String,
    max: String,
}

impl TerminalDisplay {
    fn new() -> Self {
        Self {
            level: String::new(),
            progress: 0,
            min: dbmeter::display::min_text(None),
            max: dbmeter::display::max_text(None),
        }
    }

    fn redraw(&self) {
        let filled = (self.progress.max(0) as usize * BAR_WIDTH) / config::PROGRESS_MAX as usize;
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
        print!(
            "\r\x1b[2K{:>12}  [{}]  {} | {}",
            self.level, bar, self.min, self.max
        );
        let _ = std::io::stdout().flush();
    }
}

impl DisplaySink for TerminalDisplay {
    fn set_current_level_text(&mut self, text: &str) {
        self.level = text.to_string();
        self.redraw();
    }

    fn set_progress(&mut self, progress: i32) {
        self.progress = progress;
        self.redraw();
    }

    fn set_min_text(&mut self, text: &str) {
        self.min = text.to_string();
        self.redraw();
    }

    fn set_max_text(&mut self, text: &str) {
        self.max = text.to_string();
        self.redraw();
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let app_config = config::load_config();
    let (display_tx, display_thread) = spawn_display_thread(Box::new(TerminalDisplay::new()));

    let mut meter = Meter::new(
        Arc::new(CpalBackend::new(app_config.input_device)),
        Box::new(AlwaysGranted),
        display_tx.clone(),
    );
    meter.start();

    println!("Live sound level meter. Press Enter to stop.");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    meter.stop();
    let _ = display_tx.send(DisplayCommand::Shutdown);
    if display_thread.join().is_err() {
        log::error!("Display thread panicked");
    }
    println!();
    Ok(())
}
