//! End-to-end runs of the diamond with a scripted backend and real files.

use std::sync::Arc;

use neuroprompt_config::Config;
use neuroprompt_llm::LlmError;
use neuroprompt_llm::testing::ScriptedBackend;
use neuroprompt_orchestrator::Orchestrator;
use neuroprompt_pipeline::{
    ArtifactStore, FsArtifactStore, MANIFEST_FILE, Manifest, PipelineError,
};
use tempfile::TempDir;

fn config(dir: &TempDir) -> Config {
    Config::builder()
        .primary_model("A")
        .fallback_model("B")
        .fallback_model("C")
        .artifacts_dir(dir.path().join("data").to_string_lossy().into_owned())
        .build()
        .unwrap()
}

fn orchestrator(dir: &TempDir, backend: ScriptedBackend) -> Orchestrator {
    let config = config(dir);
    let client = neuroprompt_llm::client_with_backend(&config, Arc::new(backend)).unwrap();
    Orchestrator::new(config, client)
}

#[tokio::test]
async fn successful_run_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(|inv| Ok(format!("{} by {}", inv.stage, inv.model)));
    let orch = orchestrator(&dir, backend);

    let outcome = orch.run_pipeline("Write a product launch email").await.unwrap();

    assert_eq!(outcome.final_prompt, "optimize by A");
    let data = dir.path().join("data");
    for (file, content) in [
        ("research.md", "research by A"),
        ("generated_prompt.txt", "generate by A"),
        ("prompt_critique.txt", "critique by A"),
        ("final_prompt.txt", "optimize by A"),
    ] {
        assert_eq!(std::fs::read_to_string(data.join(file)).unwrap(), content, "{file}");
    }
    assert!(data.join(MANIFEST_FILE).exists());
    assert_eq!(
        outcome.final_path.unwrap().as_std_path(),
        data.join("final_prompt.txt")
    );
}

#[tokio::test]
async fn primary_outage_falls_back_and_is_remembered() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir, ScriptedBackend::failing(&["A"]));

    let outcome = orch.run_pipeline("Summarize this report").await.unwrap();

    assert_eq!(outcome.final_prompt, "response from B");
    assert_eq!(orch.registry().is_available("A"), Some(false));
    assert_eq!(orch.registry().is_available("B"), Some(true));
}

#[tokio::test]
async fn critique_exhaustion_keeps_upstream_artifacts() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(|inv| {
        if inv.stage == "critique" {
            Err(LlmError::ProviderQuota(format!("{} rate limited", inv.model)))
        } else {
            Ok(format!("{} output", inv.stage))
        }
    });
    let orch = orchestrator(&dir, backend);

    let failure = orch.run_pipeline("Write a haiku").await.unwrap_err();

    assert_eq!(failure.failed_stage(), Some("critique"));
    assert!(matches!(failure.error, PipelineError::StageFailed { .. }));
    let exhausted = failure.error.providers_exhausted().unwrap();
    assert_eq!(exhausted.providers(), vec!["A", "B", "C"]);

    let data = dir.path().join("data");
    assert!(data.join("research.md").exists());
    assert!(data.join("generated_prompt.txt").exists());
    assert!(!data.join("prompt_critique.txt").exists());
    assert!(!data.join("final_prompt.txt").exists());

    let root = camino::Utf8PathBuf::from_path_buf(data).unwrap();
    let manifest = Manifest::load(&root).unwrap().unwrap();
    let stages: Vec<&str> = manifest.artifacts.iter().map(|e| e.stage.as_str()).collect();
    assert_eq!(stages, vec!["research", "generate"]);
    assert_eq!(manifest.run_id.as_deref(), Some(failure.run_id.as_str()));
}

#[tokio::test]
async fn failed_rerun_does_not_leave_previous_run_artifacts() {
    let dir = TempDir::new().unwrap();
    let first = orchestrator(
        &dir,
        ScriptedBackend::new(|inv| Ok(format!("run1 {}", inv.stage))),
    );
    first.run_pipeline("Write a haiku").await.unwrap();

    let second = orchestrator(
        &dir,
        ScriptedBackend::new(|inv| {
            if inv.stage == "critique" {
                Err(LlmError::ProviderOutage(format!("{} down", inv.model)))
            } else {
                Ok(format!("run2 {}", inv.stage))
            }
        }),
    );
    let failure = second.run_pipeline("Write a limerick").await.unwrap_err();
    assert_eq!(failure.failed_stage(), Some("critique"));

    let root = camino::Utf8PathBuf::from_path_buf(dir.path().join("data")).unwrap();
    let store = FsArtifactStore::new(root.clone())
        .with_file_name("research", "research.md")
        .with_file_name("generate", "generated_prompt.txt")
        .with_file_name("critique", "prompt_critique.txt")
        .with_file_name("optimize", "final_prompt.txt");
    assert_eq!(store.read("research").unwrap().as_deref(), Some("run2 research"));
    assert_eq!(store.read("generate").unwrap().as_deref(), Some("run2 generate"));
    assert_eq!(store.read("critique").unwrap(), None);
    assert_eq!(store.read("optimize").unwrap(), None);

    let manifest = Manifest::load(&root).unwrap().unwrap();
    assert_eq!(manifest.run_id.as_deref(), Some(failure.run_id.as_str()));
    assert!(manifest.entry("optimize").is_none());
}
