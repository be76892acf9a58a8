//! Conversion between seconds and the UPnP `H:MM:SS` time notation.
//!
//! AVTransport reports positions and durations as `H+:MM:SS` strings and
//! receives `REL_TIME`/`ABS_TIME` seek targets in the same shape (optionally
//! with a fractional seconds part).

/// Value reported for unknown or invalid durations.
const UNKNOWN_TIME: &str = "00:00:00";

/// Formats seconds as `H:MM:SS`, truncating fractional seconds.
///
/// Negative, infinite and NaN inputs produce `"00:00:00"`.
#[must_use]
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return UNKNOWN_TIME.to_string();
    }

    let total = seconds.trunc() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// Parses `H:MM:SS`, `M:SS` or `S` (each optionally with `.fraction`) into seconds.
///
/// Returns `None` for anything that is not a non-negative time value.
#[must_use]
pub fn parse_time(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let (last, leading) = parts.split_last()?;
    let seconds: f64 = last.parse().ok().filter(|s: &f64| s.is_finite() && *s >= 0.0)?;

    let mut total = 0.0;
    for part in leading {
        let unit: u64 = part.parse().ok()?;
        total = total * 60.0 + unit as f64;
    }

    Some(total * 60.0 + seconds)
}
