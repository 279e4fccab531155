//! Stage status and criticality enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// A failure stops the pipeline; remaining stages are not attempted.
    Abort,
    /// A failure is logged and the pipeline proceeds.
    Continue,
}

impl Default for Criticality {
    fn default() -> Self {
        Self::Continue
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// The result status of a single stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed its work.
    Success,
    /// Stage found no matching hardware and did nothing.
    SkippedNoHardware,
    /// Stage ran in simulation mode and did nothing.
    SkippedDryRun,
    /// Stage failed.
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::SkippedNoHardware => write!(f, "skipped (no hardware)"),
            Self::SkippedDryRun => write!(f, "skipped (dry run)"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status is one of the skip variants.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkippedNoHardware | Self::SkippedDryRun)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criticality_display() {
        assert_eq!(Criticality::Abort.to_string(), "abort");
        assert_eq!(Criticality::Continue.to_string(), "continue");
    }

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::SkippedDryRun.to_string(), "skipped (dry run)");
        assert_eq!(StageStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_stage_status_predicates() {
        assert!(StageStatus::SkippedNoHardware.is_skip());
        assert!(StageStatus::SkippedDryRun.is_skip());
        assert!(!StageStatus::Success.is_skip());
        assert!(StageStatus::Failed.is_failure());
        assert!(!StageStatus::SkippedDryRun.is_failure());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::SkippedNoHardware).unwrap();
        assert_eq!(json, r#""skipped_no_hardware""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::SkippedNoHardware);
    }

    #[test]
    fn test_criticality_serialize() {
        let json = serde_json::to_string(&Criticality::Abort).unwrap();
        assert_eq!(json, r#""abort""#);
    }
}
