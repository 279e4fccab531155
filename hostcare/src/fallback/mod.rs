//! Ordered fallback chain of alternative update methods.
//!
//! The chain first asks its [`ChainTarget`] whether matching hardware is
//! present, captures a version descriptor, then tries each
//! [`FallbackMethod`] in declared order until one succeeds. Methods are
//! distinct operations, not retries of the same one.

use crate::context::RunContext;
use crate::core::StageOutcome;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Detail fragment used when no method was applicable.
pub const NO_METHOD_APPLICABLE: &str = "no method applicable";

/// Result of a single fallback method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum MethodResult {
    /// The method completed the update; the chain stops here.
    Success(String),
    /// The method does not apply in this environment.
    Skipped(String),
    /// The method was attempted and failed.
    Failed(String),
}

impl MethodResult {
    /// Returns the status word.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns the detail text.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Success(d) | Self::Skipped(d) | Self::Failed(d) => d,
        }
    }
}

/// One alternative way of performing the update.
#[async_trait]
pub trait FallbackMethod: Send + Sync {
    /// Returns the method name, e.g. "package-manager".
    fn name(&self) -> &str;

    /// Attempts the update.
    async fn attempt(&self, ctx: &RunContext) -> MethodResult;
}

/// The device class a chain updates.
#[async_trait]
pub trait ChainTarget: Send + Sync {
    /// Describes the target, e.g. "NVIDIA display adapter".
    fn description(&self) -> String;

    /// Returns the matching devices. Empty means no matching hardware.
    async fn detect(&self) -> Result<Vec<String>>;

    /// Describes the currently installed version, for before/after audit.
    async fn version_descriptor(&self) -> String;
}

/// Record of one attempted method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAttempt {
    /// Method name.
    pub method: String,
    /// What the method reported.
    pub result: MethodResult,
}

impl fmt::Display for MethodAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.result.detail();
        if detail.is_empty() {
            write!(f, "{}: {}", self.method, self.result.status())
        } else {
            write!(f, "{}: {} ({detail})", self.method, self.result.status())
        }
    }
}

/// How the method loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRun {
    /// Every attempted method, in order.
    pub attempts: Vec<MethodAttempt>,
    /// Name of the method that succeeded, if any.
    pub succeeded_by: Option<String>,
}

impl ChainRun {
    /// Returns true if every attempted method was skipped.
    #[must_use]
    pub fn all_skipped(&self) -> bool {
        self.attempts
            .iter()
            .all(|a| matches!(a.result, MethodResult::Skipped(_)))
    }

    fn attempts_line(&self) -> String {
        self.attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// An ordered list of fallback methods.
#[derive(Clone, Default)]
pub struct FallbackChain {
    methods: Vec<Arc<dyn FallbackMethod>>,
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("methods", &self.method_names())
            .finish()
    }
}

impl FallbackChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a method.
    #[must_use]
    pub fn then(mut self, method: Arc<dyn FallbackMethod>) -> Self {
        self.methods.push(method);
        self
    }

    /// Returns the method names in order.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Tries methods in order until one reports success.
    pub async fn run_methods(&self, ctx: &RunContext) -> ChainRun {
        let logger = ctx.logger();
        let mut attempts = Vec::with_capacity(self.methods.len());

        for method in &self.methods {
            logger.info(format!("Trying update method '{}'", method.name()));
            let result = method.attempt(ctx).await;

            let attempt = MethodAttempt {
                method: method.name().to_string(),
                result,
            };
            match &attempt.result {
                MethodResult::Success(_) => logger.success(format!("Method {attempt}")),
                MethodResult::Skipped(_) => logger.info(format!("Method {attempt}")),
                MethodResult::Failed(_) => logger.warning(format!("Method {attempt}")),
            };

            let succeeded = matches!(attempt.result, MethodResult::Success(_));
            attempts.push(attempt);
            if succeeded {
                return ChainRun {
                    attempts,
                    succeeded_by: Some(method.name().to_string()),
                };
            }
        }

        ChainRun {
            attempts,
            succeeded_by: None,
        }
    }

    /// Runs the whole chain against `target` and produces the stage outcome.
    pub async fn execute(&self, target: &dyn ChainTarget, ctx: &RunContext) -> StageOutcome {
        let devices = match target.detect().await {
            Ok(devices) => devices,
            Err(e) => {
                return StageOutcome::failed(format!(
                    "Hardware detection for {} failed: {e}",
                    target.description()
                ))
            }
        };
        if devices.is_empty() {
            return StageOutcome::skipped_no_hardware(format!("No {} found", target.description()));
        }
        ctx.logger().info(format!("Detected {}", devices.join(", ")));

        let before = target.version_descriptor().await;
        let run = self.run_methods(ctx).await;
        let after = target.version_descriptor().await;
        let versions = format!("before: {before}; after: {after}");

        match &run.succeeded_by {
            Some(method) => {
                let detail = run
                    .attempts
                    .last()
                    .map(|a| a.result.detail().to_string())
                    .unwrap_or_default();
                StageOutcome::success(format!("Updated via {method}: {detail} [{versions}]"))
            }
            None if run.attempts.is_empty() || run.all_skipped() => {
                let attempted = if run.attempts.is_empty() {
                    "none".to_string()
                } else {
                    run.attempts_line()
                };
                StageOutcome::failed(format!(
                    "{NO_METHOD_APPLICABLE}; attempted: {attempted} [{versions}]"
                ))
            }
            None => StageOutcome::failed(format!(
                "All update methods failed; attempted: {} [{versions}]",
                run.attempts_line()
            )),
        }
    }
}
