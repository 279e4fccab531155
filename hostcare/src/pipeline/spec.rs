//! Pipeline and stage specifications.

use super::{PipelineBuilder, Scope};
use crate::core::Criticality;
use crate::errors::PipelineValidationError;
use crate::stages::{Stage, StageCatalog};
use std::fmt;
use std::sync::Arc;

/// A stage placed in a pipeline.
#[derive(Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Failure policy, fixed when the pipeline is built.
    pub criticality: Criticality,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .finish_non_exhaustive()
    }
}

impl StageSpec {
    /// Creates a specification from a stage, taking its name and criticality.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            criticality: runner.criticality(),
            runner,
        }
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or whitespace-only.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Stage name cannot be empty or whitespace-only",
            ));
        }
        Ok(())
    }
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// The pipeline name.
    pub name: String,
    /// Stages in execution order.
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// Builds the pipeline for `scope` from the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog lacks a stage the scope needs.
    pub fn for_scope(
        scope: Scope,
        catalog: &StageCatalog,
    ) -> Result<Self, PipelineValidationError> {
        let missing: Vec<String> = scope
            .stages()
            .iter()
            .filter(|id| catalog.get(**id).is_none())
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Scope '{scope}' needs unregistered stages: {}",
                missing.join(", ")
            ))
            .with_stages(missing));
        }

        scope
            .stages()
            .iter()
            .filter_map(|id| catalog.get(*id))
            .try_fold(PipelineBuilder::new(scope.as_str()), PipelineBuilder::stage)?
            .build()
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
