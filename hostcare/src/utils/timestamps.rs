//! Timestamp utilities for log records, reports and host query output.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),

    /// The time of day is not `HH:MM`.
    #[error("Invalid time of day '{0}': expected HH:MM")]
    InvalidTimeOfDay(String),
}

/// Formats a timestamp as ISO 8601 with millisecond precision.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hostcare::utils::iso_timestamp;
///
/// let ts = Utc.with_ymd_and_hms(2024, 3, 1, 4, 5, 6).unwrap();
/// assert_eq!(iso_timestamp(&ts), "2024-03-01T04:05:06.000Z");
/// ```
#[must_use]
pub fn iso_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Parses a timestamp as printed by host tooling.
///
/// Supports RFC 3339 and the CIM datetime form
/// (`yyyymmddHHMMSS.ffffff+UUU`, offset in minutes).
///
/// # Errors
///
/// Returns `TimestampError` if the input cannot be parsed.
pub fn parse_host_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    parse_cim_datetime(trimmed)
}

fn parse_cim_datetime(s: &str) -> Result<Timestamp, TimestampError> {
    let invalid = || TimestampError::InvalidFormat(s.to_string());

    if s.len() < 14 || !s.is_char_boundary(14) {
        return Err(invalid());
    }
    let naive = NaiveDateTime::parse_from_str(&s[..14], "%Y%m%d%H%M%S").map_err(|_| invalid())?;

    // Offset is the trailing "+UUU" / "-UUU" in minutes.
    let offset_minutes = s
        .rfind(['+', '-'])
        .filter(|&idx| idx >= 14)
        .and_then(|idx| s[idx..].parse::<i64>().ok())
        .unwrap_or(0);

    let offset = TimeDelta::try_minutes(offset_minutes).ok_or_else(invalid)?;
    Utc.from_utc_datetime(&naive)
        .checked_sub_signed(offset)
        .ok_or_else(invalid)
}

/// Parses a schedule time of day in `HH:MM` form.
///
/// # Errors
///
/// Returns `TimestampError::InvalidTimeOfDay` for anything else.
pub fn parse_schedule_time(input: &str) -> Result<NaiveTime, TimestampError> {
    let trimmed = input.trim();
    let well_formed = trimmed.len() == 5 && trimmed.as_bytes()[2] == b':';
    if !well_formed {
        return Err(TimestampError::InvalidTimeOfDay(trimmed.to_string()));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|_| TimestampError::InvalidTimeOfDay(trimmed.to_string()))
}

/// Formats a duration as `1h 02m 03s`, `2m 03s` or `3.2s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
