//! Maintenance configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use crate::errors::{HostcareError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for a maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// `host:port` used for the connectivity check.
    #[serde(default = "default_connectivity_target")]
    pub connectivity_target: String,
    /// Connectivity check timeout in seconds.
    #[serde(default = "default_connectivity_timeout")]
    pub connectivity_timeout_secs: u64,
    /// Upper bound on any single external command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Substrings identifying the display adapters the GPU stage targets.
    #[serde(default = "default_gpu_vendor_signatures")]
    pub gpu_vendor_signatures: Vec<String>,
    /// Package-manager identifiers of vendor driver packages.
    #[serde(default = "default_gpu_package_ids")]
    pub gpu_package_ids: Vec<String>,
    /// Text offered when no GPU update method applies.
    #[serde(default = "default_gpu_guidance")]
    pub gpu_manual_guidance: String,
    /// Directories swept by the cleanup stage. Empty means the system temp dirs.
    #[serde(default)]
    pub cleanup_paths: Vec<PathBuf>,
    /// Files younger than this are kept.
    #[serde(default = "default_cleanup_min_age")]
    pub cleanup_min_age_hours: u64,
    /// Name of the recurring scheduled task.
    #[serde(default = "default_task_name")]
    pub task_name: String,
    /// SMTP relay used for emailed reports.
    #[serde(default)]
    pub smtp_server: Option<String>,
    /// Sender address for emailed reports.
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,
}

fn default_connectivity_target() -> String {
    "1.1.1.1:443".to_string()
}

fn default_connectivity_timeout() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    3600
}

fn default_gpu_vendor_signatures() -> Vec<String> {
    vec!["NVIDIA".to_string()]
}

fn default_gpu_package_ids() -> Vec<String> {
    vec![
        "Nvidia.GeForceExperience".to_string(),
        "Nvidia.App".to_string(),
    ]
}

fn default_gpu_guidance() -> String {
    "download the current driver from https://www.nvidia.com/Download/index.aspx".to_string()
}

fn default_cleanup_min_age() -> u64 {
    24
}

fn default_task_name() -> String {
    "hostcare-maintenance".to_string()
}

fn default_smtp_from() -> String {
    "hostcare@localhost".to_string()
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            connectivity_target: default_connectivity_target(),
            connectivity_timeout_secs: default_connectivity_timeout(),
            command_timeout_secs: default_command_timeout(),
            gpu_vendor_signatures: default_gpu_vendor_signatures(),
            gpu_package_ids: default_gpu_package_ids(),
            gpu_manual_guidance: default_gpu_guidance(),
            cleanup_paths: Vec::new(),
            cleanup_min_age_hours: default_cleanup_min_age(),
            task_name: default_task_name(),
            smtp_server: None,
            smtp_from: default_smtp_from(),
        }
    }
}

impl MaintenanceConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HostcareError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| HostcareError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field values.
    pub fn validate(&self) -> Result<()> {
        if self.connectivity_timeout_secs == 0 {
            return Err(HostcareError::Config(
                "connectivity_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(HostcareError::Config(
                "command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.gpu_vendor_signatures.iter().all(|s| s.trim().is_empty()) {
            return Err(HostcareError::Config(
                "gpu_vendor_signatures must name at least one vendor".to_string(),
            ));
        }
        let has_port = self
            .connectivity_target
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !has_port {
            return Err(HostcareError::Config(format!(
                "connectivity_target '{}' must be host:port",
                self.connectivity_target
            )));
        }
        if self.task_name.trim().is_empty() {
            return Err(HostcareError::Config("task_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Connectivity check timeout.
    #[must_use]
    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }

    /// Per-command timeout.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Minimum file age for cleanup.
    #[must_use]
    pub fn cleanup_min_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_min_age_hours.saturating_mul(3600))
    }
}
