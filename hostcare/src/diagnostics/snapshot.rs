//! Immutable pre-flight capture of host state.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One gibibyte in bytes.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Free disk space below this triggers a low-disk advisory.
pub const LOW_DISK_THRESHOLD_BYTES: u64 = 10 * GIB;

/// How the host is powered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PowerSource {
    /// Mains power.
    Ac,
    /// Running on battery, with charge percentage when known.
    Battery {
        /// Remaining charge (0–100).
        percent: Option<u8>,
    },
}

impl fmt::Display for PowerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ac => write!(f, "AC power"),
            Self::Battery { percent: Some(p) } => write!(f, "battery ({p}%)"),
            Self::Battery { percent: None } => write!(f, "battery"),
        }
    }
}

/// Machine state captured once per run, before any mutating stage.
///
/// Any field the host could not answer is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// When the snapshot was taken.
    pub captured_at: Timestamp,
    /// Host name.
    pub host_name: Option<String>,
    /// Operating system name and version.
    pub os_version: Option<String>,
    /// Free space on the system volume.
    pub free_disk_bytes: Option<u64>,
    /// Installed physical memory.
    pub total_memory_bytes: Option<u64>,
    /// Power state; `None` when there is no battery to report on.
    pub power_source: Option<PowerSource>,
    /// Creation time of the most recent restore point.
    pub last_checkpoint_time: Option<Timestamp>,
}

/// Kind of pre-flight advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// Free disk space is below [`LOW_DISK_THRESHOLD_BYTES`].
    LowDiskSpace,
    /// Host is on battery power.
    OnBattery,
}

/// A warning derived from a snapshot. Advisories never affect control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// What the advisory is about.
    pub kind: AdvisoryKind,
    /// Message suitable for the audit log.
    pub message: String,
}

impl DiagnosticsSnapshot {
    /// Creates a snapshot with every field unknown.
    #[must_use]
    pub fn empty(captured_at: Timestamp) -> Self {
        Self {
            captured_at,
            host_name: None,
            os_version: None,
            free_disk_bytes: None,
            total_memory_bytes: None,
            power_source: None,
            last_checkpoint_time: None,
        }
    }

    /// Returns true if free disk space is known to be below the threshold.
    #[must_use]
    pub fn is_low_on_disk(&self) -> bool {
        self.free_disk_bytes
            .is_some_and(|free| free < LOW_DISK_THRESHOLD_BYTES)
    }

    /// Derives the advisories for this snapshot.
    #[must_use]
    pub fn advisories(&self) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        if let Some(free) = self.free_disk_bytes.filter(|_| self.is_low_on_disk()) {
            advisories.push(Advisory {
                kind: AdvisoryKind::LowDiskSpace,
                message: format!(
                    "Low disk space: {} free (recommended at least {})",
                    format_bytes(free),
                    format_bytes(LOW_DISK_THRESHOLD_BYTES)
                ),
            });
        }

        if let Some(source @ PowerSource::Battery { .. }) = self.power_source {
            advisories.push(Advisory {
                kind: AdvisoryKind::OnBattery,
                message: format!("Running on {source}; connect to AC power before updating"),
            });
        }

        advisories
    }

    /// Renders the snapshot as `key: value` lines for the report.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let unknown = || "unknown".to_string();
        vec![
            format!("Host: {}", self.host_name.clone().unwrap_or_else(unknown)),
            format!("OS: {}", self.os_version.clone().unwrap_or_else(unknown)),
            format!(
                "Free disk: {}",
                self.free_disk_bytes.map_or_else(unknown, format_bytes)
            ),
            format!(
                "Memory: {}",
                self.total_memory_bytes.map_or_else(unknown, format_bytes)
            ),
            format!(
                "Power: {}",
                self.power_source
                    .map_or_else(|| "not reported".to_string(), |p| p.to_string())
            ),
            format!(
                "Last restore point: {}",
                self.last_checkpoint_time
                    .map_or_else(|| "none".to_string(), |t| t.to_rfc3339())
            ),
        ]
    }
}

/// Formats a byte count in GiB with one decimal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    format!("{:.1} GiB", bytes as f64 / GIB as f64)
}
