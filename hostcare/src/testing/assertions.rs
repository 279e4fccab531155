//! Assertions over outcomes and reports.

use crate::core::{StageOutcome, StageStatus};
use crate::report::RunReport;

/// Asserts that the outcome has the expected status.
pub fn assert_outcome_status(outcome: &StageOutcome, expected: StageStatus) {
    assert_eq!(
        outcome.status, expected,
        "Expected status {:?}, got {:?} ({})",
        expected, outcome.status, outcome.detail
    );
}

/// Asserts that the outcome failed and its detail mentions `needle`.
pub fn assert_outcome_failed_with(outcome: &StageOutcome, needle: &str) {
    assert!(
        outcome.is_failure(),
        "Expected failure, got {:?}: {}",
        outcome.status,
        outcome.detail
    );
    assert!(
        outcome.detail.contains(needle),
        "Expected detail to contain '{needle}', got '{}'",
        outcome.detail
    );
}

/// Asserts that the report recorded exactly these stages, in order.
pub fn assert_stage_order(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected stage order");
}

/// Asserts that the named stage was recorded with the expected status.
pub fn assert_stage_status(report: &RunReport, name: &str, expected: StageStatus) {
    let record = report
        .stage(name)
        .unwrap_or_else(|| panic!("Stage '{name}' not in report"));
    assert_outcome_status(&record.outcome, expected);
}
