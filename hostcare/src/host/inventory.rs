//! Hardware and host-state queries.

use super::command::{CommandRunner, CommandSpec};
use super::parse_json_list;
use crate::diagnostics::{HostProbe, PowerSource};
use crate::errors::{HostcareError, Result};
use crate::stages::ports::{DisplayAdapter, DisplayAdapterQuery, FirmwareInfo, FirmwareQuery};
use crate::utils::{parse_host_timestamp, Timestamp};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{Disks, System};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VideoController {
    name: Option<String>,
    driver_version: Option<String>,
}

/// Display adapters from `Win32_VideoController`.
pub struct CimDisplayAdapters {
    runner: Arc<dyn CommandRunner>,
}

impl CimDisplayAdapters {
    /// Creates the query over `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl DisplayAdapterQuery for CimDisplayAdapters {
    async fn adapters(&self) -> Result<Vec<DisplayAdapter>> {
        let spec = CommandSpec::powershell(
            "@(Get-CimInstance Win32_VideoController | Select-Object Name, DriverVersion) \
             | ConvertTo-Json -Compress",
        );
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(HostcareError::collaborator(
                "display-adapters",
                output.failure_summary(),
            ));
        }
        let controllers: Vec<VideoController> = parse_json_list(&output.stdout)?;
        Ok(controllers
            .into_iter()
            .filter_map(|c| {
                c.name.map(|name| DisplayAdapter {
                    name,
                    driver_version: c.driver_version,
                })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FirmwareRow {
    manufacturer: Option<String>,
    version: Option<String>,
    release_date: Option<String>,
    board: Option<String>,
}

/// Firmware details from `Win32_BIOS` and `Win32_BaseBoard`.
pub struct CimFirmwareQuery {
    runner: Arc<dyn CommandRunner>,
}

impl CimFirmwareQuery {
    /// Creates the query over `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FirmwareQuery for CimFirmwareQuery {
    async fn firmware(&self) -> Result<FirmwareInfo> {
        let spec = CommandSpec::powershell(
            "$b = Get-CimInstance Win32_BIOS; $m = Get-CimInstance Win32_BaseBoard; \
             $d = if ($b.ReleaseDate) { $b.ReleaseDate.ToString('yyyy-MM-dd') } else { $null }; \
             [pscustomobject]@{ Manufacturer = $b.Manufacturer; Version = $b.SMBIOSBIOSVersion; \
             ReleaseDate = $d; Board = $m.Product } | ConvertTo-Json -Compress",
        );
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(HostcareError::collaborator("firmware", output.failure_summary()));
        }
        let row: FirmwareRow = serde_json::from_str(output.stdout.trim())?;
        Ok(FirmwareInfo {
            vendor: non_blank(row.manufacturer),
            version: non_blank(row.version),
            release_date: non_blank(row.release_date),
            board: non_blank(row.board),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BatteryRow {
    battery_status: Option<u16>,
    estimated_charge_remaining: Option<u8>,
}

// Win32_Battery.BatteryStatus 2 means AC power.
fn power_from_cim(rows: &[BatteryRow]) -> Option<PowerSource> {
    let row = rows.first()?;
    match row.battery_status {
        Some(2) => Some(PowerSource::Ac),
        Some(_) => Some(PowerSource::Battery {
            percent: row.estimated_charge_remaining,
        }),
        None => None,
    }
}

fn power_from_sysfs(root: &Path) -> Option<PowerSource> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let dir = entry.path();
        let read = |name: &str| {
            std::fs::read_to_string(dir.join(name))
                .ok()
                .map(|s| s.trim().to_string())
        };
        if read("type").as_deref() != Some("Battery") {
            continue;
        }
        let percent = read("capacity").and_then(|c| c.parse().ok());
        return match read("status").as_deref() {
            Some("Discharging") => Some(PowerSource::Battery { percent }),
            Some(_) => Some(PowerSource::Ac),
            None => None,
        };
    }
    None
}

/// Host facts from `sysinfo`, with CIM queries on Windows for battery and
/// restore points.
pub struct SystemHostProbe {
    runner: Arc<dyn CommandRunner>,
}

impl SystemHostProbe {
    /// Creates a probe that shells out through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn powershell_stdout(&self, script: &str) -> Option<String> {
        match self.runner.run(&CommandSpec::powershell(script)).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                debug!(summary = %output.failure_summary(), "Host query failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "Host query could not run");
                None
            }
        }
    }
}

fn system_volume_free(disks: &Disks) -> Option<u64> {
    let system_root = if cfg!(windows) {
        std::env::var("SystemDrive")
            .map(|d| format!("{d}\\"))
            .unwrap_or_else(|_| "C:\\".to_string())
    } else {
        "/".to_string()
    };
    disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new(&system_root))
        .map(sysinfo::Disk::available_space)
}

#[async_trait]
impl HostProbe for SystemHostProbe {
    async fn host_name(&self) -> Option<String> {
        System::host_name()
    }

    async fn os_version(&self) -> Option<String> {
        System::long_os_version()
    }

    async fn free_disk_bytes(&self) -> Option<u64> {
        tokio::task::spawn_blocking(|| system_volume_free(&Disks::new_with_refreshed_list()))
            .await
            .ok()
            .flatten()
    }

    async fn total_memory_bytes(&self) -> Option<u64> {
        let mut sys = System::new();
        sys.refresh_memory();
        Some(sys.total_memory()).filter(|m| *m > 0)
    }

    async fn power_source(&self) -> Option<PowerSource> {
        if !cfg!(windows) {
            return power_from_sysfs(Path::new("/sys/class/power_supply"));
        }
        let stdout = self
            .powershell_stdout(
                "@(Get-CimInstance Win32_Battery | Select-Object BatteryStatus, \
                 EstimatedChargeRemaining) | ConvertTo-Json -Compress",
            )
            .await?;
        let rows: Vec<BatteryRow> = parse_json_list(&stdout).ok()?;
        power_from_cim(&rows)
    }

    async fn last_checkpoint_time(&self) -> Option<Timestamp> {
        if !cfg!(windows) {
            return None;
        }
        let stdout = self
            .powershell_stdout(
                "Get-CimInstance -Namespace root/default -ClassName SystemRestore \
                 | Sort-Object SequenceNumber | Select-Object -Last 1 -ExpandProperty CreationTime",
            )
            .await?;
        parse_host_timestamp(stdout.trim()).ok()
    }
}
