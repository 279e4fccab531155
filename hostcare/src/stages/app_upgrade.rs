use super::ports::PackageUpgrader;
use super::Stage;
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::errors::Result;
use crate::pipeline::StageId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Upgrades every installed application through the package manager.
pub struct AppUpgradeStage {
    upgrader: Arc<dyn PackageUpgrader>,
}

impl AppUpgradeStage {
    /// Creates the stage over a package manager.
    #[must_use]
    pub fn new(upgrader: Arc<dyn PackageUpgrader>) -> Self {
        Self { upgrader }
    }
}

impl fmt::Debug for AppUpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUpgradeStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for AppUpgradeStage {
    fn name(&self) -> &str {
        StageId::AppUpgrade.as_str()
    }

    fn criticality(&self) -> Criticality {
        Criticality::Continue
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        "Would upgrade all installed applications with available upgrades".to_string()
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<StageOutcome> {
        let summary = self.upgrader.upgrade_all().await?;

        if summary.failed == 0 {
            return Ok(match summary.upgraded {
                0 => StageOutcome::success("All applications up to date"),
                n => StageOutcome::success(format!("Upgraded {n} application(s)")),
            });
        }

        let mut detail = format!(
            "{} upgrade(s) failed, {} succeeded",
            summary.failed, summary.upgraded
        );
        if !summary.failures.is_empty() {
            detail.push_str(": ");
            detail.push_str(&summary.failures.join("; "));
        }
        Ok(StageOutcome::failed(detail))
    }
}
