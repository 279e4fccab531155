//! Audit logging for maintenance runs.
//!
//! The audit trail is a sequence of [`LogRecord`]s fanned out by a
//! [`RunLogger`] to its [`LogSink`]s. Each record is also mirrored as a
//! `tracing` event so the usual subscriber can pick it up.

mod record;
mod sink;

pub use record::{LogLevel, LogRecord};
pub use sink::{CollectingLogSink, ConsoleLogSink, FileLogSink, LogSink, NoOpLogSink};

use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "HOSTCARE_LOG";

/// Initializes the global `tracing` subscriber, writing to stderr.
///
/// The filter is read from [`LOG_FILTER_ENV`] and defaults to `warn`.
/// Calling this more than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct LoggerState {
    last_timestamp: Option<Timestamp>,
}

/// Handle to the audit log of one run.
///
/// Cloning is cheap; clones share the sinks and the ordering state. Records
/// are written under one lock, so the trail is strictly in emission order
/// and timestamps never decrease.
#[derive(Clone)]
pub struct RunLogger {
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
    state: Arc<Mutex<LoggerState>>,
}

impl fmt::Debug for RunLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLogger")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RunLogger {
    /// Creates a logger writing to the given sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
            state: Arc::new(Mutex::new(LoggerState {
                last_timestamp: None,
            })),
        }
    }

    /// Creates a logger that discards records.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(vec![Arc::new(NoOpLogSink)])
    }

    /// Emits a record and returns it.
    ///
    /// Sink write failures are reported through `tracing` and otherwise
    /// suppressed; logging never fails a run.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> LogRecord {
        let mut state = self.state.lock();

        let now = now_utc();
        let timestamp = match state.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);

        let record = LogRecord::new(timestamp, level, message);
        mirror_to_tracing(&record);

        for sink in self.sinks.iter() {
            if let Err(e) = sink.write(&record) {
                warn!(error = %e, "Failed to write audit log record");
            }
        }

        record
    }

    /// Emits an `Info` record.
    pub fn info(&self, message: impl Into<String>) -> LogRecord {
        self.log(LogLevel::Info, message)
    }

    /// Emits a `Warning` record.
    pub fn warning(&self, message: impl Into<String>) -> LogRecord {
        self.log(LogLevel::Warning, message)
    }

    /// Emits an `Error` record.
    pub fn error(&self, message: impl Into<String>) -> LogRecord {
        self.log(LogLevel::Error, message)
    }

    /// Emits a `Success` record.
    pub fn success(&self, message: impl Into<String>) -> LogRecord {
        self.log(LogLevel::Success, message)
    }

    /// Flushes every sink.
    pub fn flush(&self) {
        let _state = self.state.lock();
        for sink in self.sinks.iter() {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "Failed to flush audit log sink");
            }
        }
    }
}

fn mirror_to_tracing(record: &LogRecord) {
    match record.level {
        LogLevel::Info => info!(target: "hostcare::audit", "{}", record.message),
        LogLevel::Success => {
            info!(target: "hostcare::audit", outcome = "success", "{}", record.message);
        }
        LogLevel::Warning => warn!(target: "hostcare::audit", "{}", record.message),
        LogLevel::Error => error!(target: "hostcare::audit", "{}", record.message),
    }
}
