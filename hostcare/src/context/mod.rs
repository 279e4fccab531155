//! Run context for pipeline execution.
//!
//! A [`RunContext`] is built once per run and handed to every stage by
//! shared reference. It is never mutated after construction.

mod run_context;

pub use run_context::RunContext;
