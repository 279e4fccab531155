//! Sequential pipeline execution.
//!
//! Stages run one at a time in pipeline order. A failed stage ends the run
//! only if its criticality is [`Criticality::Abort`].

use super::{PipelineSpec, StageSpec};
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome, StageStatus, UNSPECIFIED_FAILURE};
use crate::logging::LogLevel;
use crate::report::{RunReport, RunStatus, StageRecord};
use crate::utils::now_utc;
use tracing::{debug, info_span, Instrument};

/// Runs a [`PipelineSpec`] against a [`RunContext`].
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    pipeline: PipelineSpec,
}

fn normalize(mut outcome: StageOutcome) -> StageOutcome {
    if outcome.status == StageStatus::Failed && outcome.detail.trim().is_empty() {
        outcome.detail = UNSPECIFIED_FAILURE.to_string();
    }
    outcome
}

fn outcome_level(outcome: &StageOutcome) -> LogLevel {
    match outcome.status {
        StageStatus::Success => LogLevel::Success,
        StageStatus::SkippedNoHardware | StageStatus::SkippedDryRun => LogLevel::Info,
        StageStatus::Failed => LogLevel::Error,
    }
}

impl PipelineRunner {
    /// Creates a runner for `pipeline`.
    #[must_use]
    pub fn new(pipeline: PipelineSpec) -> Self {
        Self { pipeline }
    }

    /// The pipeline this runner executes.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineSpec {
        &self.pipeline
    }

    async fn run_stage(&self, spec: &StageSpec, ctx: &RunContext) -> StageOutcome {
        if ctx.dry_run() {
            return StageOutcome::skipped_dry_run(spec.runner.dry_run_description(ctx));
        }
        match spec.runner.execute(ctx).await {
            Ok(outcome) => normalize(outcome),
            Err(e) => StageOutcome::failed(e.to_string()),
        }
    }

    /// Runs every stage in order and returns the report.
    ///
    /// Never calls [`Stage::execute`](crate::stages::Stage::execute) in a
    /// dry run.
    pub async fn run(&self, ctx: RunContext) -> RunReport {
        let logger = ctx.logger();
        let started_at = now_utc();
        let mut stages = Vec::with_capacity(self.pipeline.len());
        let mut aborted_by = None;
        let mut not_attempted = Vec::new();

        logger.info(format!(
            "Starting {} pipeline ({} stage(s)){}",
            self.pipeline.name,
            self.pipeline.len(),
            if ctx.dry_run() { " in dry-run mode" } else { "" }
        ));

        for (index, spec) in self.pipeline.stages.iter().enumerate() {
            logger.info(format!("Stage '{}' starting", spec.name));
            let stage_started = now_utc();

            let outcome = self
                .run_stage(spec, &ctx)
                .instrument(info_span!("stage", name = %spec.name, run_id = %ctx.run_id()))
                .await;

            let abort = outcome.is_failure() && spec.criticality == Criticality::Abort;
            let suffix = match (outcome.is_failure(), spec.criticality) {
                (true, Criticality::Abort) => " (aborting run)",
                (true, Criticality::Continue) => " (continuing)",
                _ => "",
            };
            logger.log(
                outcome_level(&outcome),
                format!("Stage '{}' {}{suffix}", spec.name, outcome.summary_line()),
            );

            stages.push(StageRecord {
                name: spec.name.clone(),
                criticality: spec.criticality,
                outcome,
                started_at: stage_started,
                finished_at: now_utc(),
            });

            if abort {
                aborted_by = Some(spec.name.clone());
                not_attempted = self.pipeline.stages[index + 1..]
                    .iter()
                    .map(|s| s.name.clone())
                    .collect();
                if !not_attempted.is_empty() {
                    logger.warning(format!("Not attempted: {}", not_attempted.join(", ")));
                }
                break;
            }
        }

        let status = if aborted_by.is_some() {
            RunStatus::Aborted
        } else {
            RunStatus::Success
        };
        debug!(%status, stages = stages.len(), "Pipeline finished");

        RunReport {
            run_id: ctx.run_id(),
            scope: ctx.scope(),
            dry_run: ctx.dry_run(),
            started_at,
            finished_at: now_utc(),
            stages,
            diagnostics: ctx.diagnostics().clone(),
            status,
            aborted_by,
            not_attempted,
        }
    }
}
