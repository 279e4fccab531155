//! Collaborators the orchestrator drives around the pipeline.

use crate::errors::Result;
use crate::pipeline::Scope;
use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Confirms administrator-equivalent privilege.
#[async_trait]
pub trait PrivilegeCheck: Send + Sync {
    /// Returns `Ok(false)` when the process is known to be unprivileged and
    /// `Err` when privilege cannot be determined.
    async fn is_elevated(&self) -> Result<bool>;
}

/// Creates rollback checkpoints.
#[async_trait]
pub trait CheckpointService: Send + Sync {
    /// Creates a checkpoint labelled `description`.
    async fn create(&self, description: &str) -> Result<()>;
}

/// A recurring invocation of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInvocation {
    /// Scheduler task name.
    pub task_name: String,
    /// Daily start time.
    pub time: NaiveTime,
    /// Scope the scheduled run uses.
    pub scope: Scope,
    /// Whether the scheduled run suppresses the restart prompt.
    pub skip_reboot: bool,
}

impl ScheduledInvocation {
    /// The invocation registered by `--schedule-task`: Full scope, no restart prompt.
    #[must_use]
    pub fn recurring_full(task_name: impl Into<String>, time: NaiveTime) -> Self {
        Self {
            task_name: task_name.into(),
            time,
            scope: Scope::Full,
            skip_reboot: true,
        }
    }

    /// Command-line arguments for the scheduled run.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec!["--scope".to_string(), self.scope.to_string()];
        if self.skip_reboot {
            args.push("--skip-reboot".to_string());
        }
        args
    }
}

/// Registers recurring invocations.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Registers (or replaces) `invocation`.
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()>;
}

/// Asks the operator about restarting and performs the restart.
#[async_trait]
pub trait RebootPrompt: Send + Sync {
    /// Returns true if the operator agreed to restart now.
    async fn confirm(&self, message: &str) -> bool;

    /// Restarts the host.
    async fn restart(&self) -> Result<()>;
}
