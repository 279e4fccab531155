//! End-to-end maintenance run.
//!
//! The [`Orchestrator`] wraps the pipeline runner with everything that
//! happens around it: the privilege precondition, diagnostics, the optional
//! rollback checkpoint, report export and delivery, schedule registration
//! and the restart prompt. Only the privilege check and scope resolution can
//! stop a run; everything after them is logged and the run carries on.

mod ports;

pub use ports::{
    CheckpointService, PrivilegeCheck, RebootPrompt, ScheduledInvocation, TaskScheduler,
};

use crate::config::MaintenanceConfig;
use crate::context::RunContext;
use crate::diagnostics::{check_connectivity, ConnectivityProbe, DiagnosticsCollector, HostProbe};
use crate::errors::{PreconditionError, Result};
use crate::logging::{LogLevel, RunLogger};
use crate::pipeline::{PipelineRunner, PipelineSpec, Scope};
use crate::report::{ReportTransport, RunReport, RunStatus};
use crate::stages::StageCatalog;
use crate::utils::{format_duration, generate_run_id};
use chrono::NaiveTime;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Options for one run, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Which stages to run.
    pub scope: Scope,
    /// Describe instead of execute.
    pub dry_run: bool,
    /// Suppress the post-run restart prompt.
    pub skip_reboot: bool,
    /// Create a checkpoint before the first stage.
    pub enable_rollback: bool,
    /// Register a daily Full run at this time after the run.
    pub schedule_at: Option<NaiveTime>,
    /// Recipient for the report, if any.
    pub email_report: Option<String>,
    /// Where to write the JSON report, if anywhere.
    pub report_json: Option<PathBuf>,
}

impl RunOptions {
    /// A live run of `scope` with every optional step off.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            dry_run: false,
            skip_reboot: false,
            enable_rollback: false,
            schedule_at: None,
            email_report: None,
            report_json: None,
        }
    }
}

/// The external collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Elevation precondition.
    pub privilege: Arc<dyn PrivilegeCheck>,
    /// Source of the diagnostics snapshot.
    pub probe: Arc<dyn HostProbe>,
    /// Advisory network check.
    pub connectivity: Arc<dyn ConnectivityProbe>,
    /// Rollback checkpoints for `--enable-rollback`.
    pub checkpoint: Arc<dyn CheckpointService>,
    /// Task registration for `--schedule-task`.
    pub scheduler: Arc<dyn TaskScheduler>,
    /// `None` turns `--email-report` into a logged no-op.
    pub transport: Option<Arc<dyn ReportTransport>>,
    /// Post-run restart prompt.
    pub reboot: Arc<dyn RebootPrompt>,
    /// Stages available to scope resolution.
    pub catalog: StageCatalog,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("catalog", &self.catalog)
            .field("transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Drives one maintenance run from precondition to restart prompt.
#[derive(Debug)]
pub struct Orchestrator {
    config: MaintenanceConfig,
    collaborators: Collaborators,
    logger: RunLogger,
}

impl Orchestrator {
    /// Creates an orchestrator that logs through `logger`.
    #[must_use]
    pub fn new(config: MaintenanceConfig, collaborators: Collaborators, logger: RunLogger) -> Self {
        Self {
            config,
            collaborators,
            logger,
        }
    }

    /// The audit logger shared with every stage.
    #[must_use]
    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Runs maintenance.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if privilege is not confirmed, and a
    /// validation error if the scope cannot be resolved. Nothing on the host
    /// has been touched in either case. Stage failures, including an aborted
    /// run, are reported through the returned [`RunReport`].
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let run_id = generate_run_id();
        self.run_with_id(options, run_id)
            .instrument(info_span!("run", %run_id, scope = %options.scope))
            .await
    }

    async fn run_with_id(&self, options: &RunOptions, run_id: Uuid) -> Result<RunReport> {
        self.check_privilege().await?;
        let pipeline = self.resolve(options.scope)?;

        let snapshot = DiagnosticsCollector::new(self.collaborators.probe.clone())
            .collect_and_advise(&self.logger)
            .await;
        if snapshot.last_checkpoint_time.is_none() && !options.enable_rollback {
            self.logger
                .warning("No existing restore point found; consider --enable-rollback");
        }
        check_connectivity(
            self.collaborators.connectivity.as_ref(),
            &self.config.connectivity_target,
            self.config.connectivity_timeout(),
            &self.logger,
        )
        .await;

        if options.enable_rollback {
            self.create_checkpoint(options).await;
        }

        let ctx = RunContext::new(options.scope, snapshot, self.logger.clone())
            .with_dry_run(options.dry_run)
            .with_skip_reboot(options.skip_reboot)
            .with_run_id(run_id);
        let report = PipelineRunner::new(pipeline).run(ctx).await;
        self.log_summary(&report);

        self.export(&report, options).await;
        if let Some(time) = options.schedule_at {
            self.register_schedule(time, options.dry_run).await;
        }
        self.offer_restart(&report, options).await;

        self.logger.flush();
        Ok(report)
    }

    async fn check_privilege(&self) -> Result<()> {
        match self.collaborators.privilege.is_elevated().await {
            Ok(true) => Ok(()),
            Ok(false) => {
                let err = PreconditionError::NotElevated;
                self.logger.error(err.to_string());
                Err(err.into())
            }
            Err(e) => {
                let err = PreconditionError::PrivilegeUnknown(e.to_string());
                self.logger.error(err.to_string());
                Err(err.into())
            }
        }
    }

    fn resolve(&self, scope: Scope) -> Result<PipelineSpec> {
        let pipeline = PipelineSpec::for_scope(scope, &self.collaborators.catalog)?;
        if pipeline.is_empty() {
            return Err(PreconditionError::EmptyScope(scope).into());
        }
        Ok(pipeline)
    }

    async fn create_checkpoint(&self, options: &RunOptions) {
        let description = format!("hostcare: before {} maintenance", options.scope);
        if options.dry_run {
            self.logger
                .info(format!("Dry run: would create restore point '{description}'"));
            return;
        }
        self.logger.info("Creating restore point");
        match self.collaborators.checkpoint.create(&description).await {
            Ok(()) => {
                self.logger
                    .success(format!("Restore point '{description}' created"));
            }
            Err(e) => {
                self.logger.warning(format!(
                    "Restore point could not be created ({e}); continuing without rollback"
                ));
            }
        }
    }

    fn log_summary(&self, report: &RunReport) {
        let duration = format_duration(report.duration());
        let failures = report.failure_count();
        match (report.status, report.aborted_by.as_deref()) {
            (RunStatus::Aborted, Some(stage)) => self.logger.error(format!(
                "Maintenance aborted by '{stage}' after {duration}"
            )),
            _ if failures > 0 => self.logger.warning(format!(
                "Maintenance finished in {duration} with {failures} failed stage(s)"
            )),
            _ => self
                .logger
                .success(format!("Maintenance finished in {duration}")),
        };
        info!(status = %report.status, failures, "Run finished");
    }

    async fn export(&self, report: &RunReport, options: &RunOptions) {
        if let Some(path) = &options.report_json {
            match report.write_json(path) {
                Ok(()) => self
                    .logger
                    .info(format!("JSON report written to {}", path.display())),
                Err(e) => self.logger.warning(format!(
                    "JSON report could not be written to {}: {e}",
                    path.display()
                )),
            };
        }

        let Some(recipient) = options.email_report.as_deref() else {
            return;
        };
        let Some(transport) = &self.collaborators.transport else {
            self.logger
                .info(format!("No report transport configured; not emailing {recipient}"));
            return;
        };
        match transport.send(report, recipient).await {
            Ok(()) => self.logger.info(format!("Report emailed to {recipient}")),
            Err(e) => self
                .logger
                .warning(format!("Report could not be emailed to {recipient}: {e}")),
        };
    }

    async fn register_schedule(&self, time: NaiveTime, dry_run: bool) {
        let invocation = ScheduledInvocation::recurring_full(self.config.task_name.clone(), time);
        let at = time.format("%H:%M");
        if dry_run {
            self.logger.info(format!(
                "Dry run: would register daily task '{}' at {at}",
                invocation.task_name
            ));
            return;
        }
        match self.collaborators.scheduler.register(&invocation).await {
            Ok(()) => self.logger.success(format!(
                "Registered daily task '{}' at {at}",
                invocation.task_name
            )),
            Err(e) => self.logger.warning(format!(
                "Daily task '{}' could not be registered: {e}",
                invocation.task_name
            )),
        };
    }

    async fn offer_restart(&self, report: &RunReport, options: &RunOptions) {
        if !report.reboot_required() || options.dry_run {
            return;
        }
        if options.skip_reboot {
            self.logger
                .info("A restart is required; prompt suppressed by --skip-reboot");
            return;
        }
        let reboot = &self.collaborators.reboot;
        if !reboot
            .confirm("A restart is required to finish installing updates. Restart now?")
            .await
        {
            self.logger.info("Restart postponed by operator");
            return;
        }
        match reboot.restart().await {
            Ok(()) => self.logger.log(LogLevel::Info, "Restart scheduled"),
            Err(e) => self.logger.log(LogLevel::Warning, format!("Restart failed: {e}")),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageOutcome, StageStatus};
    use crate::errors::HostcareError;
    use crate::logging::CollectingLogSink;
    use crate::pipeline::StageId;
    use crate::testing::{
        assert_stage_order, fake_ports, FakePorts, RecordingCheckpoint, RecordingScheduler,
        RecordingTransport, ScriptedRebootPrompt, ScriptedStage, StaticConnectivity,
        StaticHostProbe, StaticPrivilege,
    };
    use pretty_assertions::assert_eq;

    struct Host {
        ports: FakePorts,
        checkpoint: Arc<RecordingCheckpoint>,
        scheduler: Arc<RecordingScheduler>,
        transport: Arc<RecordingTransport>,
        reboot: Arc<ScriptedRebootPrompt>,
        privilege: StaticPrivilege,
        probe: StaticHostProbe,
        online: bool,
        catalog: Option<StageCatalog>,
    }

    impl Host {
        fn new() -> Self {
            Self {
                ports: fake_ports(),
                checkpoint: Arc::new(RecordingCheckpoint::new()),
                scheduler: Arc::new(RecordingScheduler::new()),
                transport: Arc::new(RecordingTransport::new()),
                reboot: Arc::new(ScriptedRebootPrompt::answering(false)),
                privilege: StaticPrivilege::Elevated,
                probe: StaticHostProbe::healthy(),
                online: true,
                catalog: None,
            }
        }

        // The real cleanup stage would sweep the test machine's temp dir.
        fn default_catalog(&self) -> StageCatalog {
            StageCatalog::from_ports(&MaintenanceConfig::default(), self.ports.ports()).with(
                StageId::DiskCleanup,
                Arc::new(ScriptedStage::cont("disk-cleanup")),
            )
        }

        fn orchestrator(&self) -> (Orchestrator, Arc<CollectingLogSink>) {
            let sink = Arc::new(CollectingLogSink::new());
            let collaborators = Collaborators {
                privilege: Arc::new(self.privilege.clone()),
                probe: Arc::new(self.probe.clone()),
                connectivity: Arc::new(StaticConnectivity(self.online)),
                checkpoint: self.checkpoint.clone(),
                scheduler: self.scheduler.clone(),
                transport: Some(self.transport.clone()),
                reboot: self.reboot.clone(),
                catalog: self.catalog.clone().unwrap_or_else(|| self.default_catalog()),
            };
            let orchestrator = Orchestrator::new(
                MaintenanceConfig::default(),
                collaborators,
                RunLogger::new(vec![sink.clone()]),
            );
            (orchestrator, sink)
        }
    }

    #[tokio::test]
    async fn test_not_elevated_stops_before_any_stage() {
        let mut host = Host::new();
        host.privilege = StaticPrivilege::NotElevated;
        let (orchestrator, sink) = host.orchestrator();

        let mut options = RunOptions::new(Scope::Full);
        options.enable_rollback = true;
        let err = orchestrator.run(&options).await.unwrap_err();

        assert!(matches!(
            err,
            HostcareError::Precondition(PreconditionError::NotElevated)
        ));
        assert_eq!(host.ports.total_calls(), 0);
        assert!(host.checkpoint.created().is_empty());
        assert_eq!(sink.records_at(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_privilege_is_precondition() {
        let mut host = Host::new();
        host.privilege = StaticPrivilege::Unknown("net: not found".to_string());
        let (orchestrator, _sink) = host.orchestrator();

        let err = orchestrator
            .run(&RunOptions::new(Scope::Bios))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("net: not found"));
    }

    #[tokio::test]
    async fn test_missing_stage_is_validation_error() {
        let mut host = Host::new();
        host.catalog = Some(StageCatalog::new());
        let (orchestrator, _sink) = host.orchestrator();

        let err = orchestrator
            .run(&RunOptions::new(Scope::Gpu))
            .await
            .unwrap_err();
        assert!(matches!(err, HostcareError::Validation(ref v) if v.stages == vec!["gpu-drivers"]));
    }

    #[tokio::test]
    async fn test_full_live_run() {
        let host = Host::new();
        let (orchestrator, sink) = host.orchestrator();

        let report = orchestrator.run(&RunOptions::new(Scope::Full)).await.unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_stage_order(
            &report,
            &["windows-update", "app-upgrade", "gpu-drivers", "disk-cleanup", "bios-guidance"],
        );
        assert_eq!(report.diagnostics.host_name.as_deref(), Some("test-host"));
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.starts_with("Maintenance finished in")));
    }

    #[tokio::test]
    async fn test_offline_is_advisory_only() {
        let mut host = Host::new();
        host.online = false;
        let (orchestrator, sink) = host.orchestrator();

        let report = orchestrator.run(&RunOptions::new(Scope::Full)).await.unwrap();

        let offline: Vec<_> = sink
            .records_at(LogLevel::Warning)
            .into_iter()
            .filter(|r| r.message.starts_with("No internet connectivity"))
            .collect();
        assert_eq!(offline.len(), 1);
        assert_stage_order(
            &report,
            &["windows-update", "app-upgrade", "gpu-drivers", "disk-cleanup", "bios-guidance"],
        );
        assert_eq!(report.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_rollback_checkpoint_created_before_stages() {
        let host = Host::new();
        let (orchestrator, sink) = host.orchestrator();

        let mut options = RunOptions::new(Scope::WindowsOnly);
        options.enable_rollback = true;
        orchestrator.run(&options).await.unwrap();

        assert_eq!(
            host.checkpoint.created(),
            vec!["hostcare: before WindowsOnly maintenance"]
        );
        let messages = sink.messages();
        let created = messages
            .iter()
            .position(|m| m.starts_with("Restore point"))
            .unwrap();
        let first_stage = messages
            .iter()
            .position(|m| m == "Stage 'windows-update' starting")
            .unwrap();
        assert!(created < first_stage);
    }

    #[tokio::test]
    async fn test_checkpoint_failure_is_warning() {
        let mut host = Host::new();
        host.checkpoint = Arc::new(RecordingCheckpoint::failing("System Restore is disabled"));
        let (orchestrator, sink) = host.orchestrator();

        let mut options = RunOptions::new(Scope::Bios);
        options.enable_rollback = true;
        let report = orchestrator.run(&options).await.unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert!(sink
            .records_at(LogLevel::Warning)
            .iter()
            .any(|r| r.message.contains("System Restore is disabled")));
    }

    #[tokio::test]
    async fn test_missing_restore_point_advisory() {
        let mut host = Host::new();
        host.probe = StaticHostProbe::healthy().without_checkpoint();
        let (orchestrator, sink) = host.orchestrator();
        orchestrator.run(&RunOptions::new(Scope::Bios)).await.unwrap();
        assert!(sink
            .records_at(LogLevel::Warning)
            .iter()
            .any(|r| r.message.starts_with("No existing restore point")));

        let mut options = RunOptions::new(Scope::Bios);
        options.enable_rollback = true;
        let (orchestrator, sink) = host.orchestrator();
        orchestrator.run(&options).await.unwrap();
        assert!(!sink
            .messages()
            .iter()
            .any(|m| m.starts_with("No existing restore point")));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let host = Host::new();
        let (orchestrator, sink) = host.orchestrator();

        let options = RunOptions {
            dry_run: true,
            enable_rollback: true,
            schedule_at: NaiveTime::from_hms_opt(3, 0, 0),
            ..RunOptions::new(Scope::Full)
        };
        let report = orchestrator.run(&options).await.unwrap();

        assert!(report
            .stages
            .iter()
            .all(|s| s.outcome.status == StageStatus::SkippedDryRun));
        assert_eq!(host.ports.total_calls(), 0);
        assert!(host.checkpoint.created().is_empty());
        assert!(host.scheduler.registered().is_empty());
        let messages = sink.messages();
        assert!(messages.iter().any(|m| m.starts_with("Dry run: would create restore point")));
        assert!(messages.iter().any(|m| m.starts_with("Dry run: would register daily task")));
    }

    #[tokio::test]
    async fn test_schedule_registers_full_skip_reboot() {
        let host = Host::new();
        let (orchestrator, _sink) = host.orchestrator();

        let options = RunOptions {
            schedule_at: NaiveTime::from_hms_opt(2, 30, 0),
            ..RunOptions::new(Scope::AppsOnly)
        };
        orchestrator.run(&options).await.unwrap();

        let registered = host.scheduler.registered();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].task_name, "hostcare-maintenance");
        assert_eq!(registered[0].scope, Scope::Full);
        assert!(registered[0].skip_reboot);
    }

    #[tokio::test]
    async fn test_schedule_failure_is_warning() {
        let mut host = Host::new();
        host.scheduler = Arc::new(RecordingScheduler::failing("access denied"));
        let (orchestrator, sink) = host.orchestrator();

        let options = RunOptions {
            schedule_at: NaiveTime::from_hms_opt(2, 30, 0),
            ..RunOptions::new(Scope::Bios)
        };
        assert!(orchestrator.run(&options).await.is_ok());
        assert!(sink
            .records_at(LogLevel::Warning)
            .iter()
            .any(|r| r.message.contains("access denied")));
    }

    #[tokio::test]
    async fn test_email_failure_is_warning_and_run_succeeds() {
        let mut host = Host::new();
        host.transport = Arc::new(RecordingTransport::failing("smtp refused"));
        let (orchestrator, sink) = host.orchestrator();

        let options = RunOptions {
            email_report: Some("ops@example.com".to_string()),
            ..RunOptions::new(Scope::Bios)
        };
        let report = orchestrator.run(&options).await.unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(host.transport.recipients(), vec!["ops@example.com"]);
        assert!(sink
            .records_at(LogLevel::Warning)
            .iter()
            .any(|r| r.message.contains("smtp refused")));
    }

    #[tokio::test]
    async fn test_aborted_run_still_reports_and_emails() {
        let mut host = Host::new();
        host.catalog = Some(host.default_catalog().with(
            StageId::WindowsUpdate,
            Arc::new(ScriptedStage::abort("windows-update").failing("0x80240022")),
        ));
        let (orchestrator, _sink) = host.orchestrator();

        let options = RunOptions {
            email_report: Some("ops@example.com".to_string()),
            ..RunOptions::new(Scope::Full)
        };
        let report = orchestrator.run(&options).await.unwrap();

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.aborted_by.as_deref(), Some("windows-update"));
        assert_eq!(report.not_attempted.len(), 4);
        assert_eq!(host.transport.reports()[0].status, RunStatus::Aborted);
    }

    #[tokio::test]
    async fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let host = Host::new();
        let (orchestrator, _sink) = host.orchestrator();

        let options = RunOptions {
            report_json: Some(path.clone()),
            ..RunOptions::new(Scope::Bios)
        };
        let report = orchestrator.run(&options).await.unwrap();

        let written: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, report);
    }

    fn rebooting_host(answer: bool) -> Host {
        let mut host = Host::new();
        host.reboot = Arc::new(ScriptedRebootPrompt::answering(answer));
        host.catalog = Some(host.default_catalog().with(
            StageId::WindowsUpdate,
            Arc::new(
                ScriptedStage::abort("windows-update").with_outcome(
                    StageOutcome::success("Installed 1 update(s)").with_reboot_required(true),
                ),
            ),
        ));
        host
    }

    #[tokio::test]
    async fn test_restart_prompt_when_required() {
        let host = rebooting_host(true);
        let (orchestrator, _sink) = host.orchestrator();
        orchestrator.run(&RunOptions::new(Scope::WindowsOnly)).await.unwrap();

        assert_eq!(host.reboot.prompt_count(), 1);
        assert_eq!(host.reboot.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_declined() {
        let host = rebooting_host(false);
        let (orchestrator, sink) = host.orchestrator();
        orchestrator.run(&RunOptions::new(Scope::WindowsOnly)).await.unwrap();

        assert_eq!(host.reboot.prompt_count(), 1);
        assert_eq!(host.reboot.restart_count(), 0);
        assert!(sink.messages().contains(&"Restart postponed by operator".to_string()));
    }

    #[tokio::test]
    async fn test_skip_reboot_suppresses_prompt() {
        let host = rebooting_host(true);
        let (orchestrator, _sink) = host.orchestrator();
        let options = RunOptions {
            skip_reboot: true,
            ..RunOptions::new(Scope::WindowsOnly)
        };
        orchestrator.run(&options).await.unwrap();

        assert_eq!(host.reboot.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_no_prompt_without_reboot_flag() {
        let host = Host::new();
        let (orchestrator, _sink) = host.orchestrator();
        orchestrator.run(&RunOptions::new(Scope::Full)).await.unwrap();

        assert_eq!(host.reboot.prompt_count(), 0);
    }
}
