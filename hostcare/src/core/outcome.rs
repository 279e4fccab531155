//! Stage outcome type with factory methods.

use super::StageStatus;
use serde::{Deserialize, Serialize};

/// Detail recorded when a failure is reported without any explanation.
pub const UNSPECIFIED_FAILURE: &str = "stage reported failure without detail";

/// The outcome of a stage invocation.
///
/// `StageOutcome` is immutable once created. A `Failed` outcome always
/// carries a non-empty `detail`; the [`StageOutcome::failed`] constructor
/// substitutes [`UNSPECIFIED_FAILURE`] for blank input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The status of the stage invocation.
    pub status: StageStatus,

    /// Human-readable detail (version strings, counts, guidance text).
    pub detail: String,

    /// Whether the work done asks for a restart.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reboot_required: bool,
}

impl StageOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Success,
            detail: detail.into(),
            reboot_required: false,
        }
    }

    /// Creates an outcome for a stage that found no matching hardware.
    #[must_use]
    pub fn skipped_no_hardware(detail: impl Into<String>) -> Self {
        Self {
            status: StageStatus::SkippedNoHardware,
            detail: detail.into(),
            reboot_required: false,
        }
    }

    /// Creates an outcome for a simulated stage.
    #[must_use]
    pub fn skipped_dry_run(detail: impl Into<String>) -> Self {
        Self {
            status: StageStatus::SkippedDryRun,
            detail: detail.into(),
            reboot_required: false,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            UNSPECIFIED_FAILURE.to_string()
        } else {
            detail
        };
        Self {
            status: StageStatus::Failed,
            detail,
            reboot_required: false,
        }
    }

    /// Marks the outcome as requiring a restart.
    #[must_use]
    pub fn with_reboot_required(mut self, required: bool) -> Self {
        self.reboot_required = required;
        self
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Success
    }

    /// Returns true if the outcome is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns a single-line summary, `status: detail`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        if self.detail.is_empty() {
            self.status.to_string()
        } else {
            format!("{}: {}", self.status, self.detail)
        }
    }
}
