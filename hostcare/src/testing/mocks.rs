//! Scripted stages and fake collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::diagnostics::{ConnectivityProbe, HostProbe, PowerSource, GIB};
use crate::errors::{CommandError, HostcareError, Result};
use crate::fallback::{ChainTarget, FallbackMethod, MethodResult};
use crate::host::{CommandOutput, CommandRunner, CommandSpec};
use crate::orchestrator::{
    CheckpointService, PrivilegeCheck, RebootPrompt, ScheduledInvocation, TaskScheduler,
};
use crate::report::{ReportTransport, RunReport};
use crate::stages::ports::{
    DisplayAdapter, DisplayAdapterQuery, FirmwareInfo, FirmwareQuery, InstallSummary, OsUpdater,
    PackageUpgrade, PackageUpgrader, PendingUpdate, UpdateCategory, UpgradeSummary,
};
use crate::stages::Stage;
use crate::utils::{now_utc, Timestamp};

/// A stage that returns a scripted outcome and counts its invocations.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    criticality: Criticality,
    outcome: StageOutcome,
    error: Option<String>,
    calls: AtomicUsize,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl ScriptedStage {
    /// A stage with the given criticality that succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>, criticality: Criticality) -> Self {
        let name = name.into();
        Self {
            outcome: StageOutcome::success(format!("{name} done")),
            name,
            criticality,
            error: None,
            calls: AtomicUsize::new(0),
            journal: None,
        }
    }

    /// An Abort-criticality stage that succeeds.
    #[must_use]
    pub fn abort(name: impl Into<String>) -> Self {
        Self::new(name, Criticality::Abort)
    }

    /// A Continue-criticality stage that succeeds.
    #[must_use]
    pub fn cont(name: impl Into<String>) -> Self {
        Self::new(name, Criticality::Continue)
    }

    /// Returns `outcome` from [`Stage::execute`].
    #[must_use]
    pub fn with_outcome(mut self, outcome: StageOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Fails with the given detail.
    #[must_use]
    pub fn failing(self, detail: impl Into<String>) -> Self {
        self.with_outcome(StageOutcome::failed(detail))
    }

    /// Returns an error from [`Stage::execute`].
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Appends the stage name to `journal` on every execution.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of times [`Stage::execute`] ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        format!("Would run {}", self.name)
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<StageOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().push(self.name.clone());
        }
        match &self.error {
            Some(message) => Err(HostcareError::collaborator("scripted", message.clone())),
            None => Ok(self.outcome.clone()),
        }
    }
}

/// A fallback method with a fixed result.
#[derive(Debug)]
pub struct ScriptedMethod {
    name: String,
    result: MethodResult,
    calls: AtomicUsize,
}

impl ScriptedMethod {
    fn new(name: &str, result: MethodResult) -> Self {
        Self {
            name: name.to_string(),
            result,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn success(name: &str, detail: &str) -> Self {
        Self::new(name, MethodResult::Success(detail.to_string()))
    }

    #[must_use]
    pub fn skipped(name: &str, detail: &str) -> Self {
        Self::new(name, MethodResult::Skipped(detail.to_string()))
    }

    #[must_use]
    pub fn failed(name: &str, detail: &str) -> Self {
        Self::new(name, MethodResult::Failed(detail.to_string()))
    }

    /// Number of attempts.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackMethod for ScriptedMethod {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, _ctx: &RunContext) -> MethodResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// A chain target whose detection and versions are fixed.
#[derive(Debug)]
pub struct StaticTarget {
    detected: std::result::Result<Vec<String>, String>,
    versions: (String, String),
    version_queries: AtomicUsize,
}

impl StaticTarget {
    /// One device present.
    #[must_use]
    pub fn present() -> Self {
        Self {
            detected: Ok(vec!["Test GPU".to_string()]),
            versions: ("1.0".to_string(), "1.0".to_string()),
            version_queries: AtomicUsize::new(0),
        }
    }

    /// Nothing present.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            detected: Ok(Vec::new()),
            ..Self::present()
        }
    }

    /// Detection fails with `message`.
    #[must_use]
    pub fn broken(message: &str) -> Self {
        Self {
            detected: Err(message.to_string()),
            ..Self::present()
        }
    }

    /// Answers `before` to the first version query and `after` to later ones.
    #[must_use]
    pub fn with_versions(mut self, before: &str, after: &str) -> Self {
        self.versions = (before.to_string(), after.to_string());
        self
    }

    /// Number of version queries answered.
    #[must_use]
    pub fn version_queries(&self) -> usize {
        self.version_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainTarget for StaticTarget {
    fn description(&self) -> String {
        "test device".to_string()
    }

    async fn detect(&self) -> Result<Vec<String>> {
        self.detected
            .clone()
            .map_err(|m| HostcareError::collaborator("detect", m))
    }

    async fn version_descriptor(&self) -> String {
        if self.version_queries.fetch_add(1, Ordering::SeqCst) == 0 {
            self.versions.0.clone()
        } else {
            self.versions.1.clone()
        }
    }
}

/// A host probe with fixed answers.
#[derive(Debug, Clone)]
pub struct StaticHostProbe {
    host_name: Option<String>,
    os_version: Option<String>,
    free_disk_bytes: Option<u64>,
    total_memory_bytes: Option<u64>,
    power_source: Option<PowerSource>,
    last_checkpoint_time: Option<Timestamp>,
}

impl StaticHostProbe {
    /// A well-provisioned host on AC power with a recent restore point.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            host_name: Some("test-host".to_string()),
            os_version: Some("Windows 11 Pro 23H2".to_string()),
            free_disk_bytes: Some(120 * GIB),
            total_memory_bytes: Some(16 * GIB),
            power_source: Some(PowerSource::Ac),
            last_checkpoint_time: Some(now_utc() - chrono::Duration::days(1)),
        }
    }

    /// A host that answers nothing.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            host_name: None,
            os_version: None,
            free_disk_bytes: None,
            total_memory_bytes: None,
            power_source: None,
            last_checkpoint_time: None,
        }
    }

    #[must_use]
    pub fn with_free_disk(mut self, bytes: u64) -> Self {
        self.free_disk_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_power(mut self, power: PowerSource) -> Self {
        self.power_source = Some(power);
        self
    }

    #[must_use]
    pub fn without_checkpoint(mut self) -> Self {
        self.last_checkpoint_time = None;
        self
    }
}

#[async_trait]
impl HostProbe for StaticHostProbe {
    async fn host_name(&self) -> Option<String> {
        self.host_name.clone()
    }

    async fn os_version(&self) -> Option<String> {
        self.os_version.clone()
    }

    async fn free_disk_bytes(&self) -> Option<u64> {
        self.free_disk_bytes
    }

    async fn total_memory_bytes(&self) -> Option<u64> {
        self.total_memory_bytes
    }

    async fn power_source(&self) -> Option<PowerSource> {
        self.power_source
    }

    async fn last_checkpoint_time(&self) -> Option<Timestamp> {
        self.last_checkpoint_time
    }
}

/// A connectivity probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub bool);

#[async_trait]
impl ConnectivityProbe for StaticConnectivity {
    async fn is_reachable(&self, _target: &str, _timeout: std::time::Duration) -> bool {
        self.0
    }
}

/// An OS update subsystem with canned offers.
#[derive(Debug, Default)]
pub struct FakeOsUpdater {
    software: Vec<PendingUpdate>,
    drivers: Vec<PendingUpdate>,
    summary: Option<InstallSummary>,
    scan_error: Option<String>,
    scans: AtomicUsize,
    installs: AtomicUsize,
}

impl FakeOsUpdater {
    /// Nothing offered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_software(mut self, updates: Vec<PendingUpdate>) -> Self {
        self.software = updates;
        self
    }

    #[must_use]
    pub fn with_drivers(mut self, updates: Vec<PendingUpdate>) -> Self {
        self.drivers = updates;
        self
    }

    /// Overrides the default install result (everything installs).
    #[must_use]
    pub fn with_install_summary(mut self, summary: InstallSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    #[must_use]
    pub fn with_scan_error(mut self, message: &str) -> Self {
        self.scan_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn scan_calls(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn install_calls(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OsUpdater for FakeOsUpdater {
    async fn scan(&self, category: UpdateCategory) -> Result<Vec<PendingUpdate>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.scan_error {
            return Err(HostcareError::collaborator("os-update", message.clone()));
        }
        Ok(match category {
            UpdateCategory::Software => self.software.clone(),
            UpdateCategory::Drivers => self.drivers.clone(),
        })
    }

    async fn install(&self, updates: &[PendingUpdate]) -> Result<InstallSummary> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone().unwrap_or_else(|| InstallSummary {
            installed: updates.iter().map(|u| u.title.clone()).collect(),
            failed: Vec::new(),
            reboot_required: false,
        }))
    }
}

/// A package manager with canned results.
#[derive(Debug, Default)]
pub struct FakePackageUpgrader {
    summary: UpgradeSummary,
    packages: HashMap<String, PackageUpgrade>,
    upgrade_alls: AtomicUsize,
    package_upgrades: AtomicUsize,
}

impl FakePackageUpgrader {
    /// Everything current; no known packages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_summary(mut self, summary: UpgradeSummary) -> Self {
        self.summary = summary;
        self
    }

    /// Packages not registered here report [`PackageUpgrade::NotInstalled`].
    #[must_use]
    pub fn with_package(mut self, id: &str, result: PackageUpgrade) -> Self {
        self.packages.insert(id.to_string(), result);
        self
    }

    #[must_use]
    pub fn upgrade_all_calls(&self) -> usize {
        self.upgrade_alls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn package_calls(&self) -> usize {
        self.package_upgrades.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageUpgrader for FakePackageUpgrader {
    async fn upgrade_all(&self) -> Result<UpgradeSummary> {
        self.upgrade_alls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }

    async fn upgrade_package(&self, id: &str) -> Result<PackageUpgrade> {
        self.package_upgrades.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .packages
            .get(id)
            .cloned()
            .unwrap_or(PackageUpgrade::NotInstalled))
    }
}

/// A fixed set of display adapters.
#[derive(Debug, Default)]
pub struct StaticAdapters {
    adapters: Vec<DisplayAdapter>,
    queries: AtomicUsize,
}

impl StaticAdapters {
    /// Adapters as `(name, driver version)` pairs.
    #[must_use]
    pub fn new(adapters: Vec<(&str, Option<&str>)>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|(name, version)| DisplayAdapter {
                    name: name.to_string(),
                    driver_version: version.map(str::to_string),
                })
                .collect(),
            queries: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DisplayAdapterQuery for StaticAdapters {
    async fn adapters(&self) -> Result<Vec<DisplayAdapter>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.adapters.clone())
    }
}

/// Fixed firmware details.
#[derive(Debug)]
pub struct StaticFirmware {
    info: std::result::Result<FirmwareInfo, String>,
    queries: AtomicUsize,
}

impl StaticFirmware {
    #[must_use]
    pub fn new(info: FirmwareInfo) -> Self {
        Self {
            info: Ok(info),
            queries: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            info: Err(message.to_string()),
            queries: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirmwareQuery for StaticFirmware {
    async fn firmware(&self) -> Result<FirmwareInfo> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.info
            .clone()
            .map_err(|m| HostcareError::collaborator("firmware", m))
    }
}

/// A privilege check with a fixed answer.
#[derive(Debug, Clone)]
pub enum StaticPrivilege {
    /// Elevated.
    Elevated,
    /// Not elevated.
    NotElevated,
    /// The check itself fails.
    Unknown(String),
}

#[async_trait]
impl PrivilegeCheck for StaticPrivilege {
    async fn is_elevated(&self) -> Result<bool> {
        match self {
            Self::Elevated => Ok(true),
            Self::NotElevated => Ok(false),
            Self::Unknown(m) => Err(HostcareError::collaborator("privilege", m.clone())),
        }
    }
}

/// Records checkpoint requests.
#[derive(Debug, Default)]
pub struct RecordingCheckpoint {
    fail_with: Option<String>,
    created: Mutex<Vec<String>>,
}

impl RecordingCheckpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Descriptions of every requested checkpoint.
    #[must_use]
    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl CheckpointService for RecordingCheckpoint {
    async fn create(&self, description: &str) -> Result<()> {
        self.created.lock().push(description.to_string());
        match &self.fail_with {
            Some(m) => Err(HostcareError::collaborator("checkpoint", m.clone())),
            None => Ok(()),
        }
    }
}

/// Records scheduler registrations.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    fail_with: Option<String>,
    registered: Mutex<Vec<ScheduledInvocation>>,
}

impl RecordingScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn registered(&self) -> Vec<ScheduledInvocation> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl TaskScheduler for RecordingScheduler {
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()> {
        self.registered.lock().push(invocation.clone());
        match &self.fail_with {
            Some(m) => Err(HostcareError::collaborator("scheduler", m.clone())),
            None => Ok(()),
        }
    }
}

/// Records sent reports as `(run status, recipient)`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    fail_with: Option<String>,
    sent: Mutex<Vec<(RunReport, String)>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Recipients of every send, in order.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Reports handed to the transport.
    #[must_use]
    pub fn reports(&self) -> Vec<RunReport> {
        self.sent.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

#[async_trait]
impl ReportTransport for RecordingTransport {
    async fn send(&self, report: &RunReport, recipient: &str) -> Result<()> {
        self.sent.lock().push((report.clone(), recipient.to_string()));
        match &self.fail_with {
            Some(m) => Err(HostcareError::collaborator("report-mail", m.clone())),
            None => Ok(()),
        }
    }
}

/// A reboot prompt with a fixed answer.
#[derive(Debug, Default)]
pub struct ScriptedRebootPrompt {
    answer: bool,
    prompts: AtomicUsize,
    restarts: AtomicUsize,
}

impl ScriptedRebootPrompt {
    /// Answers `answer` to every prompt.
    #[must_use]
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RebootPrompt for ScriptedRebootPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answer
    }

    async fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A command runner answering from a table of command-line substrings.
///
/// Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedCommandRunner {
    responses: Vec<(String, CommandOutput)>,
    invocations: Mutex<Vec<String>>,
}

impl ScriptedCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `output` to any command line containing `pattern`.
    #[must_use]
    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.push((pattern.to_string(), output));
        self
    }

    /// Command lines run so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, CommandError> {
        let line = spec.command_line();
        self.invocations.lock().push(line.clone());
        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map_or_else(|| CommandOutput::ok(""), |(_, output)| output.clone()))
    }
}
