//! Ready-made contexts, subsystem bundles and reports.

use std::sync::Arc;

use super::mocks::{FakeOsUpdater, FakePackageUpgrader, StaticAdapters, StaticFirmware};
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::diagnostics::{DiagnosticsSnapshot, PowerSource, GIB};
use crate::logging::RunLogger;
use crate::pipeline::Scope;
use crate::report::{RunReport, RunStatus, StageRecord};
use crate::stages::ports::{FirmwareInfo, StagePorts};
use crate::utils::now_utc;

/// A Full-scope live context with unknown diagnostics and no log sinks.
#[must_use]
pub fn test_context() -> RunContext {
    RunContext::new(Scope::Full, DiagnosticsSnapshot::empty(now_utc()), RunLogger::disabled())
}

/// One fake per stage subsystem, kept so tests can inspect call counts.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct FakePorts {
    pub os_updater: Arc<FakeOsUpdater>,
    pub package_upgrader: Arc<FakePackageUpgrader>,
    pub display_adapters: Arc<StaticAdapters>,
    pub firmware: Arc<StaticFirmware>,
}

impl FakePorts {
    /// Erases the fakes into the [`StagePorts`] the catalog consumes.
    #[must_use]
    pub fn ports(&self) -> StagePorts {
        StagePorts {
            os_updater: self.os_updater.clone(),
            package_upgrader: self.package_upgrader.clone(),
            display_adapters: self.display_adapters.clone(),
            firmware: self.firmware.clone(),
        }
    }

    /// Calls made to any subsystem.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.os_updater.scan_calls()
            + self.os_updater.install_calls()
            + self.package_upgrader.upgrade_all_calls()
            + self.package_upgrader.package_calls()
            + self.display_adapters.query_count()
            + self.firmware.query_count()
    }
}

/// A quiet host: nothing to update, one NVIDIA adapter, Dell firmware.
#[must_use]
pub fn fake_ports() -> FakePorts {
    FakePorts {
        os_updater: Arc::new(FakeOsUpdater::new()),
        package_upgrader: Arc::new(FakePackageUpgrader::new()),
        display_adapters: Arc::new(StaticAdapters::new(vec![(
            "NVIDIA GeForce RTX 3070",
            Some("31.0.15.3623"),
        )])),
        firmware: Arc::new(StaticFirmware::new(FirmwareInfo {
            vendor: Some("Dell Inc.".to_string()),
            version: Some("1.18.0".to_string()),
            release_date: Some("2023-08-14".to_string()),
            board: Some("0XJ8C4".to_string()),
        })),
    }
}

/// A successful Full run on `test-host` with two recorded stages.
#[must_use]
pub fn sample_report() -> RunReport {
    let now = now_utc();
    let mut diagnostics = DiagnosticsSnapshot::empty(now);
    diagnostics.host_name = Some("test-host".to_string());
    diagnostics.free_disk_bytes = Some(64 * GIB);
    diagnostics.power_source = Some(PowerSource::Ac);

    let record = |name: &str, criticality, outcome| StageRecord {
        name: name.to_string(),
        criticality,
        outcome,
        started_at: now,
        finished_at: now,
    };

    RunReport {
        run_id: uuid::Uuid::new_v4(),
        scope: Scope::Full,
        dry_run: false,
        started_at: now,
        finished_at: now,
        stages: vec![
            record(
                "windows-update",
                Criticality::Abort,
                StageOutcome::success("No updates available"),
            ),
            record(
                "app-upgrade",
                Criticality::Continue,
                StageOutcome::success("Upgraded 2 application(s)"),
            ),
        ],
        diagnostics,
        status: RunStatus::Success,
        aborted_by: None,
        not_attempted: Vec::new(),
    }
}
