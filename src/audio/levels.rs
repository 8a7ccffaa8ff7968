use crate::config::DB_FLOOR;

/// Maximum representable amplitude of a 16-bit sample, the 0 dBFS reference.
const REFERENCE_AMPLITUDE: f64 = 32767.0;

/// Computes the RMS level of one sample block in dBFS, clamped to
/// [DB_FLOOR, 0.0]. Uniform silence (and an empty block) returns DB_FLOOR
/// directly rather than taking log10 of zero.
pub fn block_level_db(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return DB_FLOOR;
    }

    let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    let rms = (sum / samples.len() as f64).sqrt();
    if rms == 0.0 {
        return DB_FLOOR;
    }

    let db = 20.0 * (rms / REFERENCE_AMPLITUDE).log10();
    db.clamp(DB_FLOOR, 0.0)
}
