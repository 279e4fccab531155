//! # Hostcare
//!
//! A host-maintenance orchestrator.
//!
//! Hostcare runs a fixed sequence of maintenance stages against the local
//! machine with support for:
//!
//! - **Scoped pipelines**: a closed set of scopes, each an ordered list of stages
//! - **Failure policy**: each stage either aborts the run or lets it continue
//! - **Fallback chains**: ordered alternative methods for GPU driver updates
//! - **Dry runs**: every stage describes its work without touching the host
//! - **Audit logging**: timestamped records to console and file, plus a run report
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hostcare::prelude::*;
//!
//! let catalog = StageCatalog::from_ports(&config, ports);
//! let pipeline = PipelineSpec::for_scope(Scope::Full, &catalog)?;
//! let ctx = RunContext::new(Scope::Full, snapshot, logger).with_dry_run(true);
//!
//! let report = PipelineRunner::new(pipeline).run(ctx).await;
//! println!("{}", report.render_text());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod fallback;
pub mod host;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::MaintenanceConfig;
    pub use crate::context::RunContext;
    pub use crate::core::{Criticality, StageOutcome, StageStatus};
    pub use crate::diagnostics::{DiagnosticsCollector, DiagnosticsSnapshot, HostProbe};
    pub use crate::errors::{HostcareError, PipelineValidationError, PreconditionError};
    pub use crate::fallback::{ChainTarget, FallbackChain, FallbackMethod, MethodResult};
    pub use crate::logging::{LogLevel, LogSink, RunLogger};
    pub use crate::orchestrator::{Collaborators, Orchestrator, RunOptions};
    pub use crate::pipeline::{PipelineBuilder, PipelineRunner, PipelineSpec, Scope, StageId};
    pub use crate::report::{RunReport, RunStatus};
    pub use crate::stages::{Stage, StageCatalog};
    pub use crate::utils::{iso_timestamp, Timestamp};
}
