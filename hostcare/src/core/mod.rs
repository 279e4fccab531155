//! Core domain model types for hostcare.
//!
//! This module contains the fundamental types used throughout the orchestrator:
//! - Stage status and criticality enums
//! - Stage outcome type with factory methods

mod outcome;
mod status;

pub use outcome::{StageOutcome, UNSPECIFIED_FAILURE};
pub use status::{Criticality, StageStatus};
