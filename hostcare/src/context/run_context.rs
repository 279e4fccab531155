//! The immutable per-run context.

use crate::diagnostics::DiagnosticsSnapshot;
use crate::logging::RunLogger;
use crate::pipeline::Scope;
use crate::utils::generate_run_id;
use uuid::Uuid;

/// Everything a stage may read during one run.
///
/// Owned by the pipeline runner for the duration of a run. Stages receive
/// `&RunContext` and cannot change it.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    scope: Scope,
    dry_run: bool,
    skip_reboot: bool,
    logger: RunLogger,
    diagnostics: DiagnosticsSnapshot,
}

impl RunContext {
    /// Creates a context for a live run.
    #[must_use]
    pub fn new(scope: Scope, diagnostics: DiagnosticsSnapshot, logger: RunLogger) -> Self {
        Self {
            run_id: generate_run_id(),
            scope,
            dry_run: false,
            skip_reboot: false,
            logger,
            diagnostics,
        }
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the skip-reboot flag.
    #[must_use]
    pub fn with_skip_reboot(mut self, skip_reboot: bool) -> Self {
        self.skip_reboot = skip_reboot;
        self
    }

    /// Sets a specific run ID.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the selected scope.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns true if every stage must only simulate.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns true if the post-run restart prompt is suppressed.
    #[must_use]
    pub fn skip_reboot(&self) -> bool {
        self.skip_reboot
    }

    /// Returns the audit logger.
    #[must_use]
    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Returns the pre-flight diagnostics snapshot.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsSnapshot {
        &self.diagnostics
    }
}
