use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed capture format: 44.1 kHz mono 16-bit linear PCM.
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 1;

/// How often the display is refreshed with a new reading.
pub const UPDATE_INTERVAL_MS: u64 = 500;
/// Trailing window the min/max range is computed over.
pub const WINDOW_MS: u64 = 40_000;

/// Silence floor in dBFS; also the clamp for sub-floor readings.
pub const DB_FLOOR: f64 = -90.0;
/// Offset added to dBFS readings to approximate an SPL-like display value.
pub const SPL_OFFSET: f64 = 90.0;
/// Progress bar range on the display is 0..=PROGRESS_MAX.
pub const PROGRESS_MAX: i32 = 120;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Preferred input device by name; `None` uses the host default.
    pub input_device: Option<String>,
}

fn config_path() -> PathBuf {
    let data_dir = dirs::data_dir().expect("Failed to get data directory");
    data_dir.join("com.dbmeter.app").join("config.json")
}

/// Reads the config from disk, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_config() -> AppConfig {
    let path = config_path();
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

/// Writes the config to disk, creating parent directories as needed.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    Ok(())
}
