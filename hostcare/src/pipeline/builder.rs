//! Pipeline builder with validation.

use super::{PipelineSpec, StageSpec};
use crate::errors::PipelineValidationError;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Stages run in the order they are added.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    names: HashSet<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Appends a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage name is blank or already used.
    pub fn stage(mut self, runner: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(StageSpec::new(runner))?;
        Ok(self)
    }

    /// Appends a stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if !self.names.insert(spec.name.clone()) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is already in pipeline '{}'",
                spec.name, self.name
            ))
            .with_stages(vec![spec.name]));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<PipelineSpec, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            )));
        }

        Ok(PipelineSpec {
            name: self.name,
            stages: self.stages,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Criticality;
    use crate::testing::ScriptedStage;

    fn scripted(name: &str) -> Arc<dyn Stage> {
        Arc::new(ScriptedStage::cont(name))
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("test");
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_preserves_order() {
        let pipeline = PipelineBuilder::new("test")
            .stage(scripted("c"))
            .unwrap()
            .stage(scripted("a"))
            .unwrap()
            .stage(Arc::new(ScriptedStage::abort("b")))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["c", "a", "b"]);
        assert_eq!(pipeline.stages[2].criticality, Criticality::Abort);
    }

    #[test]
    fn test_builder_duplicate_name() {
        let err = PipelineBuilder::new("test")
            .stage(scripted("stage1"))
            .unwrap()
            .stage(scripted("stage1"))
            .unwrap_err();

        assert_eq!(err.stages, vec!["stage1"]);
        assert!(err.message.contains("already in pipeline"));
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::new("test").build().unwrap_err();
        assert_eq!(err.message, "Pipeline 'test' has no stages");
    }
}
