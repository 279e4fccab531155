//! Log sink trait and implementations.

use super::{LogLevel, LogRecord};
use console::Style;
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Trait for destinations that receive audit log records.
///
/// Sinks are written to serially by [`RunLogger`](super::RunLogger); they
/// never see concurrent writes for one logger.
pub trait LogSink: Send + Sync {
    /// Writes one record.
    fn write(&self, record: &LogRecord) -> io::Result<()>;

    /// Flushes buffered output.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn write(&self, _record: &LogRecord) -> io::Result<()> {
        Ok(())
    }
}

/// An append-only log file.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn write(&self, record: &LogRecord) -> io::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{record}")
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

/// A sink that prints records to standard output, colored by level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogSink {
    color: bool,
}

impl ConsoleLogSink {
    /// Creates a sink that colors records when `color` is set.
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    /// Colors only when the terminal supports it.
    #[must_use]
    pub fn detect() -> Self {
        Self::new(console::colors_enabled())
    }

    fn render(&self, record: &LogRecord) -> String {
        if !self.color {
            return record.to_string();
        }
        let style = match record.level {
            LogLevel::Info => Style::new(),
            LogLevel::Warning => Style::new().yellow(),
            LogLevel::Error => Style::new().red(),
            LogLevel::Success => Style::new().green(),
        };
        style.force_styling(true).apply_to(record).to_string()
    }
}

impl LogSink for ConsoleLogSink {
    fn write(&self, record: &LogRecord) -> io::Result<()> {
        let line = self.render(record);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{line}")
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogSink {
    records: RwLock<Vec<LogRecord>>,
}

impl CollectingLogSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns the collected messages in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records.read().iter().map(|r| r.message.clone()).collect()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns records of one level.
    #[must_use]
    pub fn records_at(&self, level: super::LogLevel) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl LogSink for CollectingLogSink {
    fn write(&self, record: &LogRecord) -> io::Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }
}
