//! Testing utilities for hostcare runs.
//!
//! This module provides:
//! - Scripted stages, fallback methods and chain targets
//! - Fakes for every collaborator port and the command runner
//! - Ready-made contexts, subsystem bundles and reports
//! - Assertions over outcomes and reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_outcome_failed_with, assert_outcome_status, assert_stage_order, assert_stage_status,
};
pub use fixtures::{fake_ports, sample_report, test_context, FakePorts};
pub use mocks::{
    FakeOsUpdater, FakePackageUpgrader, RecordingCheckpoint, RecordingScheduler,
    RecordingTransport, ScriptedCommandRunner, ScriptedMethod, ScriptedRebootPrompt,
    ScriptedStage, StaticAdapters, StaticConnectivity, StaticFirmware, StaticHostProbe,
    StaticPrivilege, StaticTarget,
};
