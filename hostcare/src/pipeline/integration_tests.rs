//! End-to-end tests for scope resolution, failure policy and dry runs.

use crate::config::MaintenanceConfig;
use crate::context::RunContext;
use crate::core::{StageOutcome, StageStatus};
use crate::diagnostics::DiagnosticsSnapshot;
use crate::logging::{CollectingLogSink, LogLevel, RunLogger};
use crate::pipeline::{PipelineBuilder, PipelineRunner, PipelineSpec, Scope, StageId};
use crate::report::RunStatus;
use crate::stages::StageCatalog;
use crate::testing::{
    assert_stage_order, assert_stage_status, fake_ports, test_context, ScriptedStage,
};
use crate::utils::now_utc;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn logged_context(scope: Scope) -> (RunContext, Arc<CollectingLogSink>) {
    let sink = Arc::new(CollectingLogSink::new());
    let ctx = RunContext::new(
        scope,
        DiagnosticsSnapshot::empty(now_utc()),
        RunLogger::new(vec![sink.clone()]),
    );
    (ctx, sink)
}

#[tokio::test]
async fn test_abort_failure_stops_the_run() {
    let s1 = Arc::new(ScriptedStage::cont("s1"));
    let s2 = Arc::new(ScriptedStage::abort("s2").failing("install error 0x80070643"));
    let s3 = Arc::new(ScriptedStage::cont("s3"));
    let pipeline = PipelineBuilder::new("abort")
        .stage(s1.clone())
        .and_then(|b| b.stage(s2.clone()))
        .and_then(|b| b.stage(s3.clone()))
        .and_then(PipelineBuilder::build)
        .unwrap();

    let report = PipelineRunner::new(pipeline).run(test_context()).await;

    assert_stage_order(&report, &["s1", "s2"]);
    assert_stage_status(&report, "s2", StageStatus::Failed);
    assert!(report.stage("s3").is_none());
    assert_eq!(s3.call_count(), 0);
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.aborted_by.as_deref(), Some("s2"));
    assert_eq!(report.not_attempted, vec!["s3"]);
}

#[tokio::test]
async fn test_continue_failure_keeps_going() {
    let s1 = Arc::new(ScriptedStage::cont("s1"));
    let s2 = Arc::new(ScriptedStage::cont("s2").failing("no space left"));
    let s3 = Arc::new(ScriptedStage::cont("s3"));
    let pipeline = PipelineBuilder::new("continue")
        .stage(s1)
        .and_then(|b| b.stage(s2))
        .and_then(|b| b.stage(s3.clone()))
        .and_then(PipelineBuilder::build)
        .unwrap();

    let report = PipelineRunner::new(pipeline).run(test_context()).await;

    assert_stage_order(&report, &["s1", "s2", "s3"]);
    assert_stage_status(&report, "s2", StageStatus::Failed);
    assert_stage_status(&report, "s3", StageStatus::Success);
    assert_eq!(s3.call_count(), 1);
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.failure_count(), 1);
}

#[tokio::test]
async fn test_stages_run_sequentially_in_order() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut builder = PipelineBuilder::new("order");
    for name in ["a", "b", "c", "d"] {
        builder = builder
            .stage(Arc::new(ScriptedStage::cont(name).with_journal(journal.clone())))
            .unwrap();
    }

    PipelineRunner::new(builder.build().unwrap())
        .run(test_context())
        .await;

    assert_eq!(*journal.lock(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_dry_run_full_scope_touches_nothing() {
    let ports = fake_ports();
    let catalog = StageCatalog::from_ports(&MaintenanceConfig::default(), ports.ports());
    let pipeline = PipelineSpec::for_scope(Scope::Full, &catalog).unwrap();
    let runner = PipelineRunner::new(pipeline);

    let first = runner.run(test_context().with_dry_run(true)).await;
    let second = runner.run(test_context().with_dry_run(true)).await;

    assert_eq!(ports.total_calls(), 0);
    assert_eq!(first.status, RunStatus::Success);
    assert!(first
        .stages
        .iter()
        .all(|s| s.outcome.status == StageStatus::SkippedDryRun && !s.outcome.detail.is_empty()));

    let shape = |report: &crate::report::RunReport| {
        report
            .stages
            .iter()
            .map(|s| (s.name.clone(), s.outcome.status, s.outcome.detail.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[tokio::test]
async fn test_full_scope_is_concatenation_of_sub_scopes() {
    let catalog = StageCatalog::from_ports(&MaintenanceConfig::default(), fake_ports().ports());
    let names = |scope| {
        PipelineSpec::for_scope(scope, &catalog)
            .unwrap()
            .stage_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
    };

    let mut expected = Vec::new();
    expected.extend(names(Scope::WindowsOnly));
    expected.extend(names(Scope::AppsOnly));
    expected.extend(names(Scope::Gpu));
    expected.push(StageId::DiskCleanup.as_str().to_string());
    expected.extend(names(Scope::Bios));

    assert_eq!(names(Scope::Full), expected);
}

#[tokio::test]
async fn test_log_records_follow_stage_order() {
    let (ctx, sink) = logged_context(Scope::Full);
    let pipeline = PipelineBuilder::new("logged")
        .stage(Arc::new(ScriptedStage::cont("first")))
        .and_then(|b| b.stage(Arc::new(ScriptedStage::cont("second").failing("boom"))))
        .and_then(|b| b.stage(Arc::new(ScriptedStage::cont("third"))))
        .and_then(PipelineBuilder::build)
        .unwrap();

    PipelineRunner::new(pipeline).run(ctx).await;

    let records = sink.records();
    assert!(records
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));

    let starts: Vec<&str> = records
        .iter()
        .filter_map(|r| r.message.strip_prefix("Stage '"))
        .filter_map(|m| m.strip_suffix("' starting"))
        .collect();
    assert_eq!(starts, vec!["first", "second", "third"]);

    let errors = sink.records_at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("second"));
    assert!(errors[0].message.ends_with("(continuing)"));
}

#[tokio::test]
async fn test_stage_error_becomes_failed_outcome() {
    let pipeline = PipelineBuilder::new("errors")
        .stage(Arc::new(ScriptedStage::abort("updates").with_error("service not running")))
        .and_then(|b| b.stage(Arc::new(ScriptedStage::cont("after"))))
        .and_then(PipelineBuilder::build)
        .unwrap();

    let report = PipelineRunner::new(pipeline).run(test_context()).await;

    let record = report.stage("updates").unwrap();
    assert_eq!(record.outcome.status, StageStatus::Failed);
    assert!(record.outcome.detail.contains("service not running"));
    assert_eq!(report.status, RunStatus::Aborted);
}

#[tokio::test]
async fn test_reboot_flag_surfaces_in_report() {
    let pipeline = PipelineBuilder::new("reboot")
        .stage(Arc::new(ScriptedStage::abort("updates").with_outcome(
            StageOutcome::success("Installed 1 update(s)").with_reboot_required(true),
        )))
        .and_then(PipelineBuilder::build)
        .unwrap();

    let report = PipelineRunner::new(pipeline).run(test_context()).await;
    assert!(report.reboot_required());
    assert!(report.render_text().contains("Restart required: yes"));
}
