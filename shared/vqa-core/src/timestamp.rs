//! Timestamp formatting and parsing

use crate::{CoreError, Result};

/// Format seconds as `M:SS` (minutes unpadded, seconds zero-padded).
///
/// Negative and non-finite inputs render as `0:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;

    format!("{}:{:02}", minutes, secs)
}

/// Parse `HH:MM:SS(.fff)`, `MM:SS(.fff)` or SRT-style `HH:MM:SS,mmm` into seconds
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let normalized = timestamp.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let invalid = || CoreError::InvalidTimestamp(timestamp.to_string());

    let seconds = match parts.as_slice() {
        [h, m, s] => {
            let hours: u64 = h.parse().map_err(|_| invalid())?;
            let minutes: u64 = m.parse().map_err(|_| invalid())?;
            let secs: f64 = s.parse().map_err(|_| invalid())?;
            (hours * 3600 + minutes * 60) as f64 + secs
        }
        [m, s] => {
            let minutes: u64 = m.parse().map_err(|_| invalid())?;
            let secs: f64 = s.parse().map_err(|_| invalid())?;
            (minutes * 60) as f64 + secs
        }
        _ => return Err(invalid()),
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }

    Ok(seconds)
}
