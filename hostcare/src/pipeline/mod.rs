//! Pipeline building and execution.
//!
//! This module provides:
//! - The scope → stage table
//! - Pipeline specifications and a validating builder
//! - The sequential runner

mod builder;
#[cfg(test)]
mod integration_tests;
mod runner;
mod scope;
mod spec;

pub use builder::PipelineBuilder;
pub use runner::PipelineRunner;
pub use scope::{Scope, StageId};
pub use spec::{PipelineSpec, StageSpec};
