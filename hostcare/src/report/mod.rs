//! The run report: what ran, how each stage ended, and whether the run
//! completed.

use crate::core::{Criticality, StageOutcome};
use crate::diagnostics::DiagnosticsSnapshot;
use crate::errors::Result;
use crate::pipeline::Scope;
use crate::utils::{format_duration, iso_timestamp, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Completion status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage in scope was attempted.
    Success,
    /// An Abort-critical stage failed and later stages were skipped.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// One attempted stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// The stage's failure policy.
    pub criticality: Criticality,
    /// How the stage ended.
    pub outcome: StageOutcome,
    /// When the stage started.
    pub started_at: Timestamp,
    /// When the stage finished.
    pub finished_at: Timestamp,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Requested scope.
    pub scope: Scope,
    /// Whether the run was simulated.
    pub dry_run: bool,
    /// Run start.
    pub started_at: Timestamp,
    /// Run end.
    pub finished_at: Timestamp,
    /// Attempted stages, in execution order.
    pub stages: Vec<StageRecord>,
    /// Pre-flight diagnostics.
    pub diagnostics: DiagnosticsSnapshot,
    /// Completion status.
    pub status: RunStatus,
    /// The stage whose failure stopped the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_by: Option<String>,
    /// Stages in scope that were never attempted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,
}

impl RunReport {
    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// True if any attempted stage asked for a restart.
    #[must_use]
    pub fn reboot_required(&self) -> bool {
        self.stages.iter().any(|s| s.outcome.reboot_required)
    }

    /// Returns the record for `name`.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Number of attempted stages that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.stages.iter().filter(|s| s.outcome.is_failure()).count()
    }

    /// Renders the human-readable report.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { "dry run" } else { "live" };
        let _ = writeln!(out, "Maintenance report {}", self.run_id);
        let _ = writeln!(out, "Scope: {} ({mode})", self.scope);
        let _ = writeln!(
            out,
            "Started: {}  Finished: {}  Duration: {}",
            iso_timestamp(&self.started_at),
            iso_timestamp(&self.finished_at),
            format_duration(self.duration())
        );
        match &self.aborted_by {
            Some(stage) => {
                let _ = writeln!(out, "Status: {} by '{stage}'", self.status);
            }
            None => {
                let _ = writeln!(out, "Status: {}", self.status);
            }
        }

        out.push_str("\nDiagnostics:\n");
        for line in self.diagnostics.summary_lines() {
            let _ = writeln!(out, "  {line}");
        }

        out.push_str("\nStages:\n");
        for record in &self.stages {
            let _ = writeln!(out, "  {}: {}", record.name, record.outcome.summary_line());
        }
        if !self.not_attempted.is_empty() {
            let _ = writeln!(out, "  not attempted: {}", self.not_attempted.join(", "));
        }

        let _ = writeln!(
            out,
            "\nRestart required: {}",
            if self.reboot_required() { "yes" } else { "no" }
        );
        out
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the JSON report, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Delivers a finished report to a recipient.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    /// Sends `report` to `recipient`.
    async fn send(&self, report: &RunReport, recipient: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::utils::now_utc;
    use pretty_assertions::assert_eq;

    fn record(name: &str, outcome: StageOutcome) -> StageRecord {
        let ts = now_utc();
        StageRecord {
            name: name.to_string(),
            criticality: Criticality::Continue,
            outcome,
            started_at: ts,
            finished_at: ts,
        }
    }

    fn report(stages: Vec<StageRecord>) -> RunReport {
        let started_at = now_utc();
        RunReport {
            run_id: Uuid::new_v4(),
            scope: Scope::Full,
            dry_run: false,
            started_at,
            finished_at: started_at + chrono::Duration::seconds(125),
            stages,
            diagnostics: DiagnosticsSnapshot::empty(started_at),
            status: RunStatus::Success,
            aborted_by: None,
            not_attempted: Vec::new(),
        }
    }

    #[test]
    fn test_duration_and_reboot() {
        let r = report(vec![
            record("windows-update", StageOutcome::success("ok").with_reboot_required(true)),
            record("app-upgrade", StageOutcome::failed("boom")),
        ]);
        assert_eq!(r.duration(), Duration::from_secs(125));
        assert!(r.reboot_required());
        assert_eq!(r.failure_count(), 1);
        assert_eq!(
            r.stage("app-upgrade").map(|s| s.outcome.status),
            Some(StageStatus::Failed)
        );
    }

    #[test]
    fn test_render_text() {
        let mut r = report(vec![record("windows-update", StageOutcome::failed("KB1 failed"))]);
        r.status = RunStatus::Aborted;
        r.aborted_by = Some("windows-update".to_string());
        r.not_attempted = vec!["app-upgrade".to_string(), "gpu-drivers".to_string()];

        let text = r.render_text();
        assert!(text.contains("Scope: Full (live)"));
        assert!(text.contains("Duration: 2m 05s"));
        assert!(text.contains("Status: Aborted by 'windows-update'"));
        assert!(text.contains("  windows-update: failed: KB1 failed"));
        assert!(text.contains("  not attempted: app-upgrade, gpu-drivers"));
        assert!(text.contains("Restart required: no"));
        assert!(text.contains("  Host: unknown"));
    }

    #[test]
    fn test_json_shape() {
        let r = report(vec![record("bios-guidance", StageOutcome::success("v1.2"))]);
        let value: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["scope"], "Full");
        assert_eq!(value["stages"][0]["name"], "bios-guidance");
        assert_eq!(value["stages"][0]["outcome"]["status"], "success");
        assert!(value.get("aborted_by").is_none());
        assert!(value.get("not_attempted").is_none());
    }

    #[test]
    fn test_write_json_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let r = report(Vec::new());

        r.write_json(&path).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
