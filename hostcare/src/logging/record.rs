//! Audit log record and level types.

use crate::utils::{iso_timestamp, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of an audit log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Informational progress.
    Info,
    /// Advisory condition; never affects control flow.
    Warning,
    /// A failure.
    Error,
    /// A completed piece of work.
    Success,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Success => write!(f, "Success"),
        }
    }
}

/// One line of the audit log.
///
/// Renders as `[ISO-8601 timestamp] [level] message`. Downstream tooling tails
/// the file and depends on this exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was emitted.
    pub timestamp: Timestamp,
    /// The record level.
    pub level: LogLevel,
    /// The message, kept on one line.
    pub message: String,
}

impl LogRecord {
    /// Creates a record, folding line breaks in the message into spaces.
    #[must_use]
    pub fn new(timestamp: Timestamp, level: LogLevel, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let message = if message.contains(['\n', '\r']) {
            message
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            message
        };
        Self {
            timestamp,
            level,
            message,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            iso_timestamp(&self.timestamp),
            self.level,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_record_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = LogRecord::new(ts, LogLevel::Success, "Stage 'app-upgrade' completed");
        assert_eq!(
            record.to_string(),
            "[2024-01-02T03:04:05.000Z] [Success] Stage 'app-upgrade' completed"
        );
    }

    #[test]
    fn test_record_folds_newlines() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = LogRecord::new(ts, LogLevel::Error, "first\r\nsecond\n\nthird");
        assert_eq!(record.message, "first second third");
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Info.to_string(), "Info");
        assert_eq!(LogLevel::Warning.to_string(), "Warning");
        assert_eq!(LogLevel::Error.to_string(), "Error");
        assert_eq!(LogLevel::Success.to_string(), "Success");
    }
}
