use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use neuroprompt_config::Config;
use neuroprompt_llm::{CompletionRequest, ResilientClient};
use neuroprompt_pipeline::{Stage, StageInputs};

use crate::templates::StageTemplates;

/// A stage whose output is one completion from the resilient client.
///
/// The messages come from a [`StageTemplates`] implementation; sampling
/// parameters are fixed at construction.
pub struct CompletionStage {
    name: String,
    dependencies: Vec<String>,
    user_input: Arc<str>,
    client: ResilientClient,
    templates: Arc<dyn StageTemplates>,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionStage {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        dependencies: &[&str],
        user_input: Arc<str>,
        client: ResilientClient,
        templates: Arc<dyn StageTemplates>,
    ) -> Self {
        Self {
            name: name.into(),
            dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
            user_input,
            client,
            templates,
            temperature: neuroprompt_config::DEFAULT_TEMPERATURE,
            max_tokens: neuroprompt_config::DEFAULT_MAX_TOKENS,
        }
    }

    /// Take temperature and max tokens from the config, honoring
    /// `[stages.<name>]` overrides
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.temperature = config.temperature_for_stage(&self.name);
        self.max_tokens = config.max_tokens_for_stage(&self.name);
        self
    }

    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl Stage for CompletionStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn run(&self, inputs: &StageInputs) -> Result<String> {
        let messages = self.templates.render(&self.name, &self.user_input, inputs)?;
        let request = CompletionRequest::new(messages, self.temperature, self.max_tokens)
            .with_label(self.name.as_str());

        let result = self.client.complete(&request).await?;
        debug!(
            stage = %self.name,
            provider = %result.model_used,
            attempt = ?result.attempt,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Completion received"
        );

        let content = result.content().trim();
        if content.is_empty() {
            bail!(
                "Provider '{}' returned an empty completion for stage '{}'",
                result.model_used,
                self.name
            );
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::DefaultTemplates;
    use neuroprompt_llm::testing::ScriptedBackend;
    use neuroprompt_llm::{LlmBackend, ProviderRegistry, ProvidersExhausted};
    use neuroprompt_pipeline::PipelineError;
    use std::time::Duration;

    fn client(backend: ScriptedBackend, ids: &[&str]) -> ResilientClient {
        let registry = ProviderRegistry::new(ids[0], ids[1..].iter().copied()).unwrap();
        let backend: Arc<dyn LlmBackend> = Arc::new(backend);
        ResilientClient::new(backend, Arc::new(registry), Duration::from_secs(5))
    }

    fn research(client: ResilientClient) -> CompletionStage {
        CompletionStage::new(
            crate::RESEARCH,
            &[],
            Arc::from("Write a haiku"),
            client,
            Arc::new(DefaultTemplates),
        )
    }

    #[tokio::test]
    async fn test_runs_completion_and_trims_output() {
        let backend = ScriptedBackend::new(|_| Ok("  notes  \n".to_string()));
        let out = research(client(backend, &["A"]))
            .run(&StageInputs::default())
            .await
            .unwrap();
        assert_eq!(out, "notes");
    }

    #[tokio::test]
    async fn test_blank_completion_fails_stage() {
        let backend = ScriptedBackend::new(|_| Ok("   ".to_string()));
        let err = research(client(backend, &["A"]))
            .run(&StageInputs::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty completion"));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_as_typed_source() {
        let stage = research(client(ScriptedBackend::failing(&["A", "B"]), &["A", "B"]));

        let source = stage.run(&StageInputs::default()).await.unwrap_err();
        let exhausted = source.downcast_ref::<ProvidersExhausted>().unwrap();
        assert_eq!(exhausted.providers(), vec!["A", "B"]);

        let err = PipelineError::StageFailed {
            stage: crate::RESEARCH.to_string(),
            source,
        };
        assert!(err.providers_exhausted().is_some());
    }

    #[tokio::test]
    async fn test_sampling_reaches_the_backend() {
        let backend = Arc::new(ScriptedBackend::failing(&[]));
        let registry = Arc::new(ProviderRegistry::new("A", Vec::<String>::new()).unwrap());
        let client = ResilientClient::new(backend.clone(), registry, Duration::from_secs(5));

        let mut config = Config::minimal_for_testing();
        config.stages.critique = Some(neuroprompt_config::StageConfig {
            temperature: Some(0.2),
            max_tokens: Some(1500),
        });
        let stage = CompletionStage::new(
            crate::RESEARCH,
            &[],
            Arc::from("Write a haiku"),
            client,
            Arc::new(DefaultTemplates),
        )
        .with_sampling(0.3, 200);
        assert_eq!(stage.max_tokens(), 200);

        stage.run(&StageInputs::default()).await.unwrap();
        let invocation = &backend.invocations()[0];
        assert_eq!(invocation.stage, crate::RESEARCH);
        assert_eq!(invocation.metadata["max_tokens"], 200);

        let critique = CompletionStage::new(
            crate::CRITIQUE,
            &[crate::GENERATE],
            Arc::from("x"),
            ResilientClient::new(
                backend,
                Arc::new(ProviderRegistry::new("A", Vec::<String>::new()).unwrap()),
                Duration::from_secs(5),
            ),
            Arc::new(DefaultTemplates),
        )
        .with_config(&config);
        assert!((critique.temperature() - 0.2).abs() < f32::EPSILON);
        assert_eq!(critique.max_tokens(), 1500);
    }
}
