use anyhow::anyhow;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use neuroprompt_config::Config;
use neuroprompt_llm::{LlmError, ProviderRegistry, ResilientClient};
use neuroprompt_pipeline::{
    Artifact, ArtifactStore, CancelFlag, FsArtifactStore, PipelineError, PipelineExecutor,
    PipelineFailure, PipelineGraph, Stage, new_run_id,
};
use neuroprompt_stages::{
    CompletionStage, DefaultTemplates, OPTIMIZE, RESEARCH, STAGE_GRAPH, StageTemplates,
    artifact_file_name,
};

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub user_input: String,
    /// Content of the optimize stage's artifact
    pub final_prompt: String,
    pub final_artifact: Artifact,
    /// Every stage's artifact keyed by stage name
    pub stage_artifacts: BTreeMap<String, Artifact>,
    /// Where the final artifact was persisted, when the store has locations
    pub final_path: Option<Utf8PathBuf>,
}

/// Entry point that runs the research, generate, critique, optimize diamond.
///
/// The provider registry lives as long as the orchestrator, so provider
/// availability learned in one run carries over to the next.
pub struct Orchestrator {
    config: Config,
    client: ResilientClient,
    templates: Arc<dyn StageTemplates>,
    store: Option<Arc<dyn ArtifactStore>>,
    cancel: CancelFlag,
}

impl Orchestrator {
    /// Build the orchestrator with the configured backend and providers.
    ///
    /// # Errors
    ///
    /// Fails when the provider is unsupported, the API key is missing, or the
    /// provider list is invalid.
    pub fn from_config(config: Config) -> Result<Self, LlmError> {
        let client = neuroprompt_llm::from_config(&config)?;
        Ok(Self::new(config, client))
    }

    #[must_use]
    pub fn new(config: Config, client: ResilientClient) -> Self {
        Self {
            config,
            client,
            templates: Arc::new(DefaultTemplates),
            store: None,
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn StageTemplates>) -> Self {
        self.templates = templates;
        self
    }

    /// Persist artifacts to `store` instead of the configured artifacts
    /// directory
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Flag that stops the current run before its next stage. Once set it
    /// stays set for this orchestrator.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.client.registry()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The four stages for `user_input`, validated into a graph
    ///
    /// # Errors
    ///
    /// Only fails if the stage table itself is inconsistent.
    pub fn build_graph(&self, user_input: &str) -> Result<PipelineGraph, PipelineError> {
        let user_input: Arc<str> = Arc::from(user_input);
        let stages = STAGE_GRAPH
            .iter()
            .map(|(name, deps)| {
                let stage = CompletionStage::new(
                    *name,
                    deps,
                    Arc::clone(&user_input),
                    self.client.clone(),
                    Arc::clone(&self.templates),
                )
                .with_config(&self.config);
                Arc::new(stage) as Arc<dyn Stage>
            })
            .collect();
        PipelineGraph::new(stages)
    }

    /// Run the whole pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns the failing stage and cause together with every artifact that
    /// was completed and persisted before the failure.
    pub async fn run_pipeline(&self, user_input: &str) -> Result<PipelineOutcome, PipelineFailure> {
        let run_id = new_run_id();
        info!(run_id = %run_id, input_chars = user_input.chars().count(), "Generating prompt");

        let graph = self
            .build_graph(user_input)
            .map_err(|e| PipelineFailure::before_run(run_id.clone(), e))?;
        let store = self
            .store_for(&run_id)
            .map_err(|e| PipelineFailure::before_run(run_id.clone(), e))?;

        let executor = PipelineExecutor::new(Arc::clone(&store))
            .with_run_id(run_id.as_str())
            .with_cancel_flag(self.cancel.clone())
            .with_stage_timeout(self.config.stage_timeout())
            .with_rank_concurrency(self.config.rank_concurrency());

        let result = executor.run(&graph).await;
        self.log_registry(&run_id);
        let run = result?;

        let Some(final_artifact) = run.get(OPTIMIZE).cloned() else {
            return Err(PipelineFailure {
                run_id,
                error: PipelineError::StageFailed {
                    stage: OPTIMIZE.to_string(),
                    source: anyhow!("run finished without a final artifact"),
                },
                completed: run.artifacts,
            });
        };

        Ok(PipelineOutcome {
            run_id: run.run_id.clone(),
            user_input: user_input.to_string(),
            final_prompt: final_artifact.content.clone(),
            final_path: store.location(OPTIMIZE),
            stage_artifacts: run.by_stage(),
            final_artifact,
        })
    }

    // The default store reuses one directory, so files from the previous run
    // are removed before any stage of this run is persisted.
    fn store_for(&self, run_id: &str) -> Result<Arc<dyn ArtifactStore>, PipelineError> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let mut store = FsArtifactStore::new(self.config.artifacts_dir()).with_run_id(run_id);
        for (stage, _) in STAGE_GRAPH {
            if let Some(file) = artifact_file_name(stage) {
                store = store.with_file_name(stage, file);
            }
        }
        store
            .clear(STAGE_GRAPH.iter().map(|(stage, _)| *stage))
            .map_err(|source| PipelineError::Persistence {
                stage: RESEARCH.to_string(),
                source,
            })?;
        Ok(Arc::new(store))
    }

    fn log_registry(&self, run_id: &str) {
        let snapshot = self.client.registry().snapshot();
        let unavailable: Vec<&str> = snapshot
            .iter()
            .filter(|p| !p.available)
            .map(|p| p.id.as_str())
            .collect();
        if unavailable.is_empty() {
            info!(run_id = %run_id, providers = snapshot.len(), "All providers available");
        } else {
            warn!(run_id = %run_id, unavailable = ?unavailable, "Providers marked unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroprompt_llm::testing::ScriptedBackend;
    use neuroprompt_pipeline::InMemoryArtifactStore;

    fn orchestrator(backend: ScriptedBackend) -> Orchestrator {
        let config = Config::minimal_for_testing();
        let client = neuroprompt_llm::client_with_backend(&config, Arc::new(backend)).unwrap();
        Orchestrator::new(config, client).with_store(Arc::new(InMemoryArtifactStore::new()))
    }

    #[test]
    fn test_graph_is_the_diamond() {
        let graph = orchestrator(ScriptedBackend::failing(&[]))
            .build_graph("anything")
            .unwrap();
        assert_eq!(graph.order(), vec!["research", "generate", "critique", "optimize"]);
        assert_eq!(
            graph.dependencies(OPTIMIZE).unwrap(),
            &["generate".to_string(), "critique".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cancel_handle_stops_the_run() {
        let orch = orchestrator(ScriptedBackend::failing(&[]));
        orch.cancel_handle().cancel();

        let failure = orch.run_pipeline("anything").await.unwrap_err();
        assert!(matches!(failure.error, PipelineError::Cancelled { .. }));
        assert!(failure.completed.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_carries_every_stage() {
        let backend = ScriptedBackend::new(|inv| Ok(format!("{} done", inv.stage)));
        let outcome = orchestrator(backend).run_pipeline("Write a haiku").await.unwrap();

        assert_eq!(outcome.final_prompt, "optimize done");
        assert_eq!(outcome.user_input, "Write a haiku");
        assert_eq!(outcome.stage_artifacts.len(), 4);
        assert!(outcome.final_path.is_none());
    }
}
