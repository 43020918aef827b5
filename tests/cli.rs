//! CLI behavior: exit codes, output and artifacts, against a mock OpenRouter.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary run inside `dir`, with every variable discovery reads cleared
fn neuroprompt(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_neuroprompt"));
    cmd.current_dir(dir)
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("OPENROUTER_MODEL_ID")
        .env_remove("NEUROPROMPT_FALLBACK_MODELS")
        .env_remove("NEUROPROMPT_HOME")
        .env_remove("RUST_LOG");
    cmd
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 7}
    })
}

#[test]
fn help_describes_the_pipeline() {
    let dir = TempDir::new().unwrap();
    neuroprompt(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("research"))
        .stdout(predicate::str::contains("--fallback-model"));
}

#[test]
fn empty_request_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    neuroprompt(dir.path())
        .arg("   ")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("empty"));
}

fn log_files(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir.join("logs")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn each_run_writes_a_log_file() {
    let dir = TempDir::new().unwrap();
    neuroprompt(dir.path()).arg("Write a haiku").assert().code(2);

    let files = log_files(dir.path());
    assert_eq!(files.len(), 1, "{files:?}");
    assert!(files[0].starts_with("NeuroPrompt_") && files[0].ends_with(".log"));
    let contents = std::fs::read_to_string(dir.path().join("logs").join(&files[0])).unwrap();
    assert!(contents.contains("Writing log file"));
}

#[test]
fn log_file_can_be_disabled_or_redirected() {
    let dir = TempDir::new().unwrap();
    neuroprompt(dir.path())
        .args(["--no-log-file", "Write a haiku"])
        .assert()
        .code(2);
    assert!(log_files(dir.path()).is_empty());

    neuroprompt(dir.path())
        .args(["--log-file", "custom/run.log", "Write a haiku"])
        .assert()
        .code(2);
    assert!(dir.path().join("custom").join("run.log").exists());
    assert!(log_files(dir.path()).is_empty());
}

#[test]
fn missing_api_key_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    neuroprompt(dir.path())
        .arg("Write a haiku")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OPENROUTER_API_KEY"));
}

#[test]
fn invalid_config_file_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join(".neuroprompt");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(config.join("config.toml"), "[defaults]\ntemperature = 9.0\n").unwrap();

    neuroprompt(dir.path())
        .env("OPENROUTER_API_KEY", "sk-test")
        .arg("Write a haiku")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("temperature"));
}

#[tokio::test(flavor = "multi_thread")]
async fn generates_prompt_with_fallback_and_saves_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "primary/model"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "backup/model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Role: poet\nTask: haiku")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let base_url = format!("{}/chat/completions", server.uri());
    let work = dir.path().to_path_buf();

    let assert = tokio::task::spawn_blocking(move || {
        neuroprompt(&work)
            .env("OPENROUTER_API_KEY", "sk-test")
            .args([
                "--base-url",
                base_url.as_str(),
                "--model",
                "primary/model",
                "--fallback-model",
                "backup/model",
                "--artifacts-dir",
                "out",
                "-o",
                "final.txt",
                "Write a haiku about autumn",
            ])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("GENERATED PROMPT:"))
        .stdout(predicate::str::contains("Role: poet"))
        .stdout(predicate::str::contains("Prompt saved to final.txt"));

    let out = dir.path().join("out");
    for file in [
        "research.md",
        "generated_prompt.txt",
        "prompt_critique.txt",
        "final_prompt.txt",
        "manifest.json",
    ] {
        assert!(out.join(file).exists(), "{file} missing");
    }
    assert_eq!(
        std::fs::read_to_string(dir.path().join("final.txt")).unwrap(),
        "Role: poet\nTask: haiku"
    );

    // One failed primary attempt, then the backup serves every stage
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_providers_exit_with_dedicated_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let base_url = format!("{}/chat/completions", server.uri());
    let work = dir.path().to_path_buf();

    let assert = tokio::task::spawn_blocking(move || {
        neuroprompt(&work)
            .env("OPENROUTER_API_KEY", "sk-test")
            .args([
                "--base-url",
                base_url.as_str(),
                "--model",
                "A",
                "--fallback-model",
                "B",
                "Write a haiku",
            ])
            .assert()
    })
    .await
    .unwrap();

    assert
        .code(70)
        .stderr(predicate::str::contains("research"))
        .stderr(predicate::str::contains("A -> B"));

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
