//! Ports: the capabilities stages need from external subsystems.
//!
//! Each subsystem gets its own narrow trait so a stage only receives what it
//! uses. Command-backed implementations live in [`crate::host`].

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Category of operating system updates to scan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCategory {
    /// Security and quality patches.
    Software,
    /// Hardware drivers offered through the OS update channel.
    Drivers,
}

/// An update offered by the OS update subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// Subsystem identifier used to request installation.
    pub id: String,
    /// Knowledge base article, when the update has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kb: Option<String>,
    /// Human-readable title.
    pub title: String,
}

/// Result of installing a batch of OS updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Titles of installed updates.
    pub installed: Vec<String>,
    /// Titles of updates that failed to install.
    pub failed: Vec<String>,
    /// Whether a restart is needed to finish installation.
    pub reboot_required: bool,
}

/// The OS update subsystem.
#[async_trait]
pub trait OsUpdater: Send + Sync {
    /// Lists updates available in `category`.
    async fn scan(&self, category: UpdateCategory) -> Result<Vec<PendingUpdate>>;

    /// Installs the given updates.
    async fn install(&self, updates: &[PendingUpdate]) -> Result<InstallSummary>;
}

/// Result of upgrading every installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSummary {
    /// Number of packages upgraded.
    pub upgraded: usize,
    /// Number of packages whose upgrade failed.
    pub failed: usize,
    /// Short description of failures, when available.
    pub failures: Vec<String>,
}

/// Result of upgrading one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageUpgrade {
    /// A newer version was installed.
    Upgraded,
    /// The package is installed and already current.
    UpToDate,
    /// The package is not installed on this host.
    NotInstalled,
    /// The upgrade was attempted and failed.
    Failed(String),
}

/// The package-manager upgrade subsystem.
#[async_trait]
pub trait PackageUpgrader: Send + Sync {
    /// Upgrades every package with an available upgrade.
    async fn upgrade_all(&self) -> Result<UpgradeSummary>;

    /// Upgrades a single package by identifier.
    async fn upgrade_package(&self, id: &str) -> Result<PackageUpgrade>;
}

/// A display adapter reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAdapter {
    /// Adapter name, e.g. "NVIDIA GeForce RTX 3070".
    pub name: String,
    /// Installed driver version.
    pub driver_version: Option<String>,
}

impl fmt::Display for DisplayAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver_version {
            Some(version) => write!(f, "{} (driver {version})", self.name),
            None => write!(f, "{} (driver unknown)", self.name),
        }
    }
}

/// Lists installed display adapters.
#[async_trait]
pub trait DisplayAdapterQuery: Send + Sync {
    /// Returns every installed display adapter.
    async fn adapters(&self) -> Result<Vec<DisplayAdapter>>;
}

/// Firmware identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Firmware vendor.
    pub vendor: Option<String>,
    /// Firmware version string.
    pub version: Option<String>,
    /// Release date as reported.
    pub release_date: Option<String>,
    /// Mainboard product name.
    pub board: Option<String>,
}

/// Reads firmware identification.
#[async_trait]
pub trait FirmwareQuery: Send + Sync {
    /// Returns the installed firmware details.
    async fn firmware(&self) -> Result<FirmwareInfo>;
}

/// The subsystems the built-in stages depend on.
#[derive(Clone)]
pub struct StagePorts {
    /// OS update subsystem.
    pub os_updater: Arc<dyn OsUpdater>,
    /// Package-manager subsystem.
    pub package_upgrader: Arc<dyn PackageUpgrader>,
    /// Display adapter listing.
    pub display_adapters: Arc<dyn DisplayAdapterQuery>,
    /// Firmware identification.
    pub firmware: Arc<dyn FirmwareQuery>,
}

impl fmt::Debug for StagePorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePorts").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_adapter_display() {
        let adapter = DisplayAdapter {
            name: "NVIDIA GeForce RTX 3070".to_string(),
            driver_version: Some("31.0.15.3623".to_string()),
        };
        assert_eq!(
            adapter.to_string(),
            "NVIDIA GeForce RTX 3070 (driver 31.0.15.3623)"
        );

        let unknown = DisplayAdapter {
            name: "Basic Display".to_string(),
            driver_version: None,
        };
        assert_eq!(unknown.to_string(), "Basic Display (driver unknown)");
    }

    #[test]
    fn test_pending_update_serialize() {
        let update = PendingUpdate {
            id: "abc".to_string(),
            kb: None,
            title: "Cumulative Update".to_string(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"id": "abc", "title": "Cumulative Update"}));
    }
}
