use super::ports::{OsUpdater, UpdateCategory};
use super::Stage;
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::errors::Result;
use crate::pipeline::StageId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Installs pending OS software updates. A failure aborts the run.
pub struct WindowsUpdateStage {
    updater: Arc<dyn OsUpdater>,
}

impl WindowsUpdateStage {
    /// Creates the stage over an OS update subsystem.
    #[must_use]
    pub fn new(updater: Arc<dyn OsUpdater>) -> Self {
        Self { updater }
    }
}

impl fmt::Debug for WindowsUpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsUpdateStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for WindowsUpdateStage {
    fn name(&self) -> &str {
        StageId::WindowsUpdate.as_str()
    }

    fn criticality(&self) -> Criticality {
        Criticality::Abort
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        "Would scan for and install pending Windows software updates".to_string()
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StageOutcome> {
        let pending = self.updater.scan(UpdateCategory::Software).await?;
        if pending.is_empty() {
            return Ok(StageOutcome::success("No updates available"));
        }

        ctx.logger()
            .info(format!("Installing {} Windows update(s)", pending.len()));
        let summary = self.updater.install(&pending).await?;

        let outcome = if summary.failed.is_empty() {
            StageOutcome::success(format!(
                "Installed {} update(s): {}",
                summary.installed.len(),
                summary.installed.join(", ")
            ))
        } else {
            StageOutcome::failed(format!(
                "{} of {} update(s) failed: {}",
                summary.failed.len(),
                pending.len(),
                summary.failed.join(", ")
            ))
        };
        Ok(outcome.with_reboot_required(summary.reboot_required))
    }
}
