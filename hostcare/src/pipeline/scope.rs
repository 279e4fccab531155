//! Update scopes and the static scope → stage table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a built-in maintenance stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    /// Operating system patch scan and install.
    WindowsUpdate,
    /// Package-manager upgrade of installed applications.
    AppUpgrade,
    /// GPU driver refresh through the fallback chain.
    GpuDrivers,
    /// Temporary file cleanup.
    DiskCleanup,
    /// Firmware version report and update guidance.
    BiosGuidance,
}

impl StageId {
    /// Every built-in stage, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::WindowsUpdate,
        Self::AppUpgrade,
        Self::GpuDrivers,
        Self::DiskCleanup,
        Self::BiosGuidance,
    ];

    /// Returns the stage name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WindowsUpdate => "windows-update",
            Self::AppUpgrade => "app-upgrade",
            Self::GpuDrivers => "gpu-drivers",
            Self::DiskCleanup => "disk-cleanup",
            Self::BiosGuidance => "bios-guidance",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The requested update scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Every stage.
    #[default]
    Full,
    /// Operating system updates only.
    WindowsOnly,
    /// Application upgrades only.
    AppsOnly,
    /// GPU drivers only.
    #[serde(rename = "GPU")]
    Gpu,
    /// Firmware guidance only.
    #[serde(rename = "BIOS")]
    Bios,
}

const WINDOWS_ONLY: &[StageId] = &[StageId::WindowsUpdate];
const APPS_ONLY: &[StageId] = &[StageId::AppUpgrade];
const GPU: &[StageId] = &[StageId::GpuDrivers];
const BIOS: &[StageId] = &[StageId::BiosGuidance];
const FULL: &[StageId] = &[
    StageId::WindowsUpdate,
    StageId::AppUpgrade,
    StageId::GpuDrivers,
    StageId::DiskCleanup,
    StageId::BiosGuidance,
];

impl Scope {
    /// Every scope.
    pub const ALL: [Self; 5] = [
        Self::Full,
        Self::WindowsOnly,
        Self::AppsOnly,
        Self::Gpu,
        Self::Bios,
    ];

    /// Returns the ordered stages for this scope.
    ///
    /// `Full` is the WindowsOnly, AppsOnly and GPU lists, then disk cleanup,
    /// then the BIOS list.
    #[must_use]
    pub const fn stages(self) -> &'static [StageId] {
        match self {
            Self::Full => FULL,
            Self::WindowsOnly => WINDOWS_ONLY,
            Self::AppsOnly => APPS_ONLY,
            Self::Gpu => GPU,
            Self::Bios => BIOS,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::WindowsOnly => "WindowsOnly",
            Self::AppsOnly => "AppsOnly",
            Self::Gpu => "GPU",
            Self::Bios => "BIOS",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "full" => Ok(Self::Full),
            "windowsonly" => Ok(Self::WindowsOnly),
            "appsonly" => Ok(Self::AppsOnly),
            "gpu" => Ok(Self::Gpu),
            "bios" => Ok(Self::Bios),
            _ => Err(format!(
                "Unknown scope '{s}': expected one of Full, WindowsOnly, AppsOnly, GPU, BIOS"
            )),
        }
    }
}
