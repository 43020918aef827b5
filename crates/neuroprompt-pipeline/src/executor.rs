//! Pipeline execution
//!
//! [`PipelineExecutor::run`] walks a validated [`PipelineGraph`] rank by rank.
//! A stage starts only once every dependency's artifact has been written to
//! the store. The first failure stops the run; artifacts already written stay
//! in the store and are returned in the [`PipelineFailure`].

use anyhow::anyhow;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use neuroprompt_utils::error::PipelineError;
use neuroprompt_utils::logging::{
    log_stage_complete, log_stage_error, log_stage_start, stage_span,
};

use crate::artifact::Artifact;
use crate::cancel::CancelFlag;
use crate::graph::PipelineGraph;
use crate::stage::{Stage, StageInputs};
use crate::store::ArtifactStore;

/// Artifacts of a successful run, in execution order
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: String,
    pub artifacts: Vec<Artifact>,
}

impl PipelineRun {
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.stage == stage)
    }

    /// Artifacts keyed by stage name
    #[must_use]
    pub fn by_stage(&self) -> BTreeMap<String, Artifact> {
        self.artifacts
            .iter()
            .map(|a| (a.stage.clone(), a.clone()))
            .collect()
    }
}

/// A run that stopped early, with the artifacts completed before it stopped
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub run_id: String,
    pub error: PipelineError,
    pub completed: Vec<Artifact>,
}

impl PipelineFailure {
    /// Failure raised before any stage could run
    #[must_use]
    pub fn before_run(run_id: impl Into<String>, error: PipelineError) -> Self {
        Self {
            run_id: run_id.into(),
            error,
            completed: Vec::new(),
        }
    }

    /// Name of the stage the failure is attributed to
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        self.error.stage()
    }
}

#[derive(Default)]
struct RunState {
    artifacts: HashMap<String, Artifact>,
    completed: Vec<Artifact>,
}

/// Runs stage graphs against an artifact store
pub struct PipelineExecutor {
    store: Arc<dyn ArtifactStore>,
    cancel: CancelFlag,
    stage_timeout: Option<Duration>,
    rank_concurrency: bool,
    run_id: String,
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            cancel: CancelFlag::new(),
            stage_timeout: None,
            rank_concurrency: false,
            run_id: new_run_id(),
        }
    }

    /// Observe an externally owned cancellation flag
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fail any stage that runs longer than `timeout`
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Run the stages of one rank concurrently instead of one at a time
    #[must_use]
    pub fn with_rank_concurrency(mut self, enabled: bool) -> Self {
        self.rank_concurrency = enabled;
        self
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Run every stage of `graph` in topological order.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] for the first stage that fails, times
    /// out, cannot be persisted, or is reached after cancellation. Stages
    /// after it are not started.
    pub async fn run(&self, graph: &PipelineGraph) -> Result<PipelineRun, PipelineFailure> {
        info!(
            run_id = %self.run_id,
            stages = ?graph.order(),
            concurrent_ranks = self.rank_concurrency,
            "Starting pipeline run"
        );
        let started = Instant::now();
        let mut state = RunState::default();

        for rank in graph.rank_indices() {
            let outcome = if self.rank_concurrency && rank.len() > 1 {
                self.run_rank_concurrently(graph, rank, &mut state).await
            } else {
                self.run_rank_sequentially(graph, rank, &mut state).await
            };

            if let Err(error) = outcome {
                warn!(
                    run_id = %self.run_id,
                    completed = state.completed.len(),
                    error = %error,
                    "Pipeline run stopped"
                );
                return Err(PipelineFailure {
                    run_id: self.run_id.clone(),
                    error,
                    completed: state.completed,
                });
            }
        }

        info!(
            run_id = %self.run_id,
            duration_ms = %started.elapsed().as_millis(),
            "Pipeline run completed"
        );
        Ok(PipelineRun {
            run_id: self.run_id.clone(),
            artifacts: state.completed,
        })
    }

    async fn run_rank_sequentially(
        &self,
        graph: &PipelineGraph,
        rank: &[usize],
        state: &mut RunState,
    ) -> Result<(), PipelineError> {
        for &i in rank {
            let stage = graph.stage_at(i);
            self.check_cancelled(stage.name())?;

            let deps = graph.deps_at(i).to_vec();
            let inputs = collect_inputs(&deps, &state.artifacts);
            let content = execute_stage(
                self.run_id.clone(),
                Arc::clone(stage),
                deps,
                inputs,
                self.stage_timeout,
            )
            .await?;

            self.persist(stage.name(), content, state)?;
        }
        Ok(())
    }

    async fn run_rank_concurrently(
        &self,
        graph: &PipelineGraph,
        rank: &[usize],
        state: &mut RunState,
    ) -> Result<(), PipelineError> {
        if let Some(&first) = rank.first() {
            self.check_cancelled(graph.stage_at(first).name())?;
        }

        let mut tasks = JoinSet::new();
        for (slot, &i) in rank.iter().enumerate() {
            let deps = graph.deps_at(i).to_vec();
            let inputs = collect_inputs(&deps, &state.artifacts);
            let fut = execute_stage(
                self.run_id.clone(),
                Arc::clone(graph.stage_at(i)),
                deps,
                inputs,
                self.stage_timeout,
            );
            tasks.spawn(async move { (slot, fut.await) });
        }

        let mut results: Vec<Option<Result<String, PipelineError>>> =
            (0..rank.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, result)) => results[slot] = Some(result),
                Err(e) => warn!(run_id = %self.run_id, error = %e, "Stage task did not finish"),
            }
        }

        // Persist in declaration order; report the first failure in that order.
        let mut first_error = None;
        for (slot, &i) in rank.iter().enumerate() {
            let name = graph.stage_at(i).name();
            let outcome = match results[slot].take() {
                Some(Ok(content)) => self.persist(name, content, state),
                Some(Err(e)) => Err(e),
                None => Err(PipelineError::StageFailed {
                    stage: name.to_string(),
                    source: anyhow!("stage task panicked"),
                }),
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn check_cancelled(&self, next_stage: &str) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            info!(run_id = %self.run_id, before_stage = %next_stage, "Pipeline run cancelled");
            return Err(PipelineError::Cancelled {
                before_stage: next_stage.to_string(),
            });
        }
        Ok(())
    }

    fn persist(&self, stage: &str, content: String, state: &mut RunState) -> Result<(), PipelineError> {
        let artifact = Artifact::new(stage, content);
        self.store
            .write(&artifact)
            .map_err(|source| PipelineError::Persistence {
                stage: stage.to_string(),
                source,
            })?;
        debug!(run_id = %self.run_id, stage = %stage, hash = %artifact.blake3_hash, "Artifact recorded");

        state.artifacts.insert(stage.to_string(), artifact.clone());
        state.completed.push(artifact);
        Ok(())
    }
}

/// Run identifier derived from the current UTC time
#[must_use]
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

fn collect_inputs(deps: &[String], artifacts: &HashMap<String, Artifact>) -> StageInputs {
    let map = deps
        .iter()
        .filter_map(|d| artifacts.get(d).map(|a| (d.clone(), a.clone())))
        .collect();
    StageInputs::new(map)
}

async fn execute_stage(
    run_id: String,
    stage: Arc<dyn Stage>,
    deps: Vec<String>,
    inputs: StageInputs,
    timeout: Option<Duration>,
) -> Result<String, PipelineError> {
    let span = stage_span(&run_id, stage.name());
    async move {
        let name = stage.name();
        log_stage_start(&run_id, name, &deps);
        let started = Instant::now();

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, stage.run(&inputs)).await {
                Ok(result) => result.map_err(|source| PipelineError::StageFailed {
                    stage: name.to_string(),
                    source,
                }),
                Err(_) => Err(PipelineError::StageTimeout {
                    stage: name.to_string(),
                    timeout: limit,
                }),
            },
            None => stage
                .run(&inputs)
                .await
                .map_err(|source| PipelineError::StageFailed {
                    stage: name.to_string(),
                    source,
                }),
        };

        let duration_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(content) => log_stage_complete(&run_id, name, duration_ms, content.len()),
            Err(e) => log_stage_error(&run_id, name, &e.to_string(), duration_ms),
        }
        outcome
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryArtifactStore;
    use async_trait::async_trait;

    struct Echo {
        name: String,
        deps: Vec<String>,
    }

    #[async_trait]
    impl Stage for Echo {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        async fn run(&self, inputs: &StageInputs) -> anyhow::Result<String> {
            let upstream: Vec<&str> = inputs.iter().map(|(_, a)| a.content.as_str()).collect();
            Ok(format!("{}({})", self.name, upstream.join(",")))
        }
    }

    fn echo(name: &str, deps: &[&str]) -> Arc<dyn Stage> {
        Arc::new(Echo {
            name: name.to_string(),
            deps: deps.iter().map(|d| (*d).to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn test_outputs_thread_to_dependents() {
        let graph = PipelineGraph::new(vec![
            echo("research", &[]),
            echo("generate", &["research"]),
            echo("critique", &["generate"]),
            echo("optimize", &["generate", "critique"]),
        ])
        .unwrap();
        let store = Arc::new(InMemoryArtifactStore::new());

        let run = PipelineExecutor::new(store.clone())
            .with_run_id("run-1")
            .run(&graph)
            .await
            .unwrap();

        assert_eq!(run.run_id, "run-1");
        assert_eq!(
            run.get("optimize").unwrap().content,
            "optimize(critique(generate(research())),generate(research()))"
        );
        assert_eq!(store.writes(), vec!["research", "generate", "critique", "optimize"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_stage_runs_nothing() {
        let graph = PipelineGraph::new(vec![echo("a", &[])]).unwrap();
        let store = Arc::new(InMemoryArtifactStore::new());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let failure = PipelineExecutor::new(store.clone())
            .with_cancel_flag(cancel)
            .run(&graph)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, PipelineError::Cancelled { ref before_stage } if before_stage == "a"));
        assert!(failure.completed.is_empty());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_run_id_format() {
        let id = new_run_id();
        assert!(id.ends_with('Z'));
        assert!(id.contains('T'));
    }
}
