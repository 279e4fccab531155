//! Stage trait and the built-in maintenance stages.
//!
//! Stages are the units of work in a maintenance pipeline. Each stage has a
//! fixed [`Criticality`] and a side-effect-free dry-run description.

mod app_upgrade;
mod bios;
mod catalog;
mod cleanup;
mod gpu_drivers;
pub mod ports;
mod windows_update;

pub use app_upgrade::AppUpgradeStage;
pub use bios::BiosGuidanceStage;
pub use catalog::StageCatalog;
pub use cleanup::{default_cleanup_paths, CleanupTally, DiskCleanupStage};
pub use gpu_drivers::{
    AdapterTarget, GpuDriverStage, ManualGuidanceMethod, OsUpdateCategoryMethod,
    PackageManagerMethod,
};
pub use windows_update::WindowsUpdateStage;

use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for maintenance stages.
///
/// A stage is built once per pipeline definition and invoked at most once
/// per run.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage, unique within a pipeline.
    fn name(&self) -> &str;

    /// Returns how a failure of this stage affects the run.
    fn criticality(&self) -> Criticality;

    /// Describes what [`Stage::execute`] would do.
    ///
    /// Used for dry runs; must not touch the host.
    fn dry_run_description(&self, ctx: &RunContext) -> String;

    /// Executes the stage.
    ///
    /// An `Err` is recorded by the runner as a `Failed` outcome carrying the
    /// error text.
    async fn execute(&self, ctx: &RunContext) -> Result<StageOutcome>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutcome> + Send + Sync,
{
    name: String,
    criticality: Criticality,
    description: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutcome> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, criticality: Criticality, func: F) -> Self {
        let name = name.into();
        Self {
            description: format!("Would run '{name}'"),
            name,
            criticality,
            func,
        }
    }

    /// Sets the dry-run description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutcome> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutcome> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        self.description.clone()
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StageOutcome> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("probe", Criticality::Continue, |ctx| {
            Ok(StageOutcome::success(format!("scope {}", ctx.scope())))
        });

        assert_eq!(stage.name(), "probe");
        assert_eq!(stage.criticality(), Criticality::Continue);

        let ctx = test_context();
        let outcome = stage.execute(&ctx).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.detail, "scope Full");
    }

    #[test]
    fn test_fn_stage_description() {
        let ctx = test_context();
        let stage = FnStage::new("noop", Criticality::Abort, |_| Ok(StageOutcome::success("")));
        assert_eq!(stage.dry_run_description(&ctx), "Would run 'noop'");

        let stage = stage.with_description("Would do nothing");
        assert_eq!(stage.dry_run_description(&ctx), "Would do nothing");
    }
}
