//! Error types for the hostcare orchestrator.
//!
//! Stage failures are not errors: they are recorded as
//! [`StageOutcome`](crate::core::StageOutcome) values and governed by the
//! stage's criticality. The types here cover preconditions, pipeline
//! construction, configuration and the external collaborators.

use crate::pipeline::Scope;
use std::time::Duration;
use thiserror::Error;

/// The main error type for hostcare operations.
#[derive(Debug, Error)]
pub enum HostcareError {
    /// A precondition for running maintenance is not met.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// A pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An external command could not be run to completion.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// An external collaborator reported an error.
    #[error("{collaborator}: {message}")]
    Collaborator {
        /// The collaborator that failed (e.g. "checkpoint").
        collaborator: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostcareError {
    /// Creates a collaborator error.
    #[must_use]
    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// Returns true if this error must stop the process before any stage runs.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::Config(_) | Self::Validation(_))
    }
}

impl From<serde_json::Error> for HostcareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Fatal conditions detected before any host mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The process is not running with administrator privilege.
    #[error("Administrator privilege is required; re-run from an elevated shell")]
    NotElevated,

    /// Privilege could not be determined.
    #[error("Unable to confirm administrator privilege: {0}")]
    PrivilegeUnknown(String),

    /// The scope resolved to no stages.
    #[error("Scope '{0}' has no stages")]
    EmptyScope(Scope),
}

/// Error raised when a pipeline definition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when an external command cannot be run to completion.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// The program name.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish in time and was killed.
    #[error("'{program}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The program name.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

/// Result alias used across the crate.
pub type Result<T, E = HostcareError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_display() {
        let err = HostcareError::from(PreconditionError::NotElevated);
        assert!(err.to_string().contains("Administrator privilege"));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_collaborator_display() {
        let err = HostcareError::collaborator("checkpoint", "service disabled");
        assert_eq!(err.to_string(), "checkpoint: service disabled");
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_command_timeout_display() {
        let err = CommandError::Timeout {
            program: "winget".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "'winget' timed out after 30s");
    }

    #[test]
    fn test_validation_error_with_stages() {
        let err = PipelineValidationError::new("Duplicate stage name: a")
            .with_stages(vec!["a".to_string()]);
        assert_eq!(err.stages, vec!["a".to_string()]);
        assert_eq!(err.to_string(), "Duplicate stage name: a");
    }

    #[test]
    fn test_from_serde_error() {
        let err: HostcareError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, HostcareError::Serialization(_)));
    }
}
