use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::artifact::Artifact;

/// One node of a pipeline graph.
///
/// A stage declares the stages it depends on and produces exactly one text
/// output from their artifacts. The executor stamps the output into an
/// [`Artifact`] and persists it before any dependent stage starts.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique name within a graph; also the artifact key
    fn name(&self) -> &str;

    /// Names of the stages whose artifacts this stage consumes
    fn dependencies(&self) -> &[String];

    /// Produce this stage's output from its dependencies' artifacts.
    ///
    /// # Errors
    ///
    /// Any error fails the stage and halts the run.
    async fn run(&self, inputs: &StageInputs) -> Result<String>;
}

/// Read-only view of the artifacts a stage depends on, keyed by stage name
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    artifacts: BTreeMap<String, Artifact>,
}

impl StageInputs {
    #[must_use]
    pub fn new(artifacts: BTreeMap<String, Artifact>) -> Self {
        Self { artifacts }
    }

    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&Artifact> {
        self.artifacts.get(stage)
    }

    /// Content of a dependency's artifact.
    ///
    /// # Errors
    ///
    /// Fails when `stage` is not among the inputs, which means the stage
    /// asked for something it did not declare.
    pub fn content(&self, stage: &str) -> Result<&str> {
        self.artifacts
            .get(stage)
            .map(|a| a.content.as_str())
            .ok_or_else(|| anyhow!("No artifact for '{stage}' among stage inputs"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Artifact)> {
        self.artifacts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
