//! Durable artifact storage keyed by stage name
//!
//! [`FsArtifactStore`] writes every artifact atomically to its own file and
//! keeps a `manifest.json` beside them describing what was written when.
//! [`InMemoryArtifactStore`] backs tests and embedders that do not want files.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use neuroprompt_utils::atomic_write::write_file_atomic;

use crate::artifact::Artifact;

/// Manifest file name inside the artifacts directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Key-value persistence for stage artifacts.
///
/// `write` must be durable when it returns; the executor relies on that before
/// starting any dependent stage.
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact under its stage name, replacing any previous one.
    fn write(&self, artifact: &Artifact) -> Result<()>;

    /// Read back the content stored for a stage, `None` if nothing was stored.
    fn read(&self, stage: &str) -> Result<Option<String>>;

    /// Where the stage's artifact lives, for stores that have a location.
    fn location(&self, _stage: &str) -> Option<Utf8PathBuf> {
        None
    }
}

/// One persisted artifact as recorded in `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub stage: String,
    pub file: String,
    pub blake3: String,
    pub bytes: usize,
    pub completed_at: DateTime<Utc>,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: Option<String>,
    pub artifacts: Vec<ManifestEntry>,
}

impl Manifest {
    /// Load a manifest from an artifacts directory
    pub fn load(root: &Utf8Path) -> Result<Option<Self>> {
        let path = root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {path}"))?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {path}"))?;
        Ok(Some(manifest))
    }

    #[must_use]
    pub fn entry(&self, stage: &str) -> Option<&ManifestEntry> {
        self.artifacts.iter().find(|e| e.stage == stage)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Filesystem-backed artifact store.
///
/// Each stage maps to a file name under `root` (by default `<stage>.txt`).
/// The manifest starts empty for every store instance and is rewritten
/// atomically after each artifact write.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: Utf8PathBuf,
    file_names: HashMap<String, String>,
    manifest: Mutex<Manifest>,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_names: HashMap::new(),
            manifest: Mutex::new(Manifest::default()),
        }
    }

    /// Store `stage` under a specific file name instead of `<stage>.txt`
    #[must_use]
    pub fn with_file_name(mut self, stage: impl Into<String>, file: impl Into<String>) -> Self {
        self.file_names.insert(stage.into(), file.into());
        self
    }

    /// Record the run id in the manifest
    #[must_use]
    pub fn with_run_id(self, run_id: impl Into<String>) -> Self {
        lock(&self.manifest).run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// File name used for a stage
    #[must_use]
    pub fn file_name(&self, stage: &str) -> String {
        self.file_names
            .get(stage)
            .cloned()
            .unwrap_or_else(|| format!("{stage}.txt"))
    }

    #[must_use]
    pub fn path_for(&self, stage: &str) -> Utf8PathBuf {
        self.root.join(self.file_name(stage))
    }

    /// Snapshot of the manifest as last written
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        lock(&self.manifest).clone()
    }

    /// Remove the files of `stages` and the manifest left by an earlier run.
    ///
    /// After this, `read` returns `None` for every listed stage until the
    /// current run writes it. Files the store does not manage are untouched.
    pub fn clear<'a>(&self, stages: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut removed = 0usize;
        let paths = stages
            .into_iter()
            .map(|stage| self.path_for(stage))
            .chain(std::iter::once(self.root.join(MANIFEST_FILE)));
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove stale artifact: {path}"));
                }
            }
        }
        lock(&self.manifest).artifacts.clear();

        if removed > 0 {
            debug!(root = %self.root, removed, "Cleared artifacts from a previous run");
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write(&self, artifact: &Artifact) -> Result<()> {
        let file = self.file_name(&artifact.stage);
        let path = self.root.join(&file);

        let result = write_file_atomic(&path, &artifact.content)
            .with_context(|| format!("Failed to write artifact for stage '{}'", artifact.stage))?;

        let mut manifest = lock(&self.manifest);
        manifest.artifacts.retain(|e| e.stage != artifact.stage);
        manifest.artifacts.push(ManifestEntry {
            stage: artifact.stage.clone(),
            file,
            blake3: artifact.blake3_hash.clone(),
            bytes: result.bytes_written,
            completed_at: artifact.completed_at,
        });

        let json = serde_json::to_string_pretty(&*manifest)
            .context("Failed to serialize artifact manifest")?;
        write_file_atomic(&self.root.join(MANIFEST_FILE), &json)
            .context("Failed to write artifact manifest")?;

        debug!(
            stage = %artifact.stage,
            path = %path,
            bytes = result.bytes_written,
            "Artifact persisted"
        );
        Ok(())
    }

    fn read(&self, stage: &str) -> Result<Option<String>> {
        let path = self.path_for(stage);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read artifact: {path}")),
        }
    }

    fn location(&self, stage: &str) -> Option<Utf8PathBuf> {
        Some(self.path_for(stage))
    }
}

/// In-memory artifact store that also records write order
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<String>>,
}

impl InMemoryArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage names in the order their artifacts were written
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write(&self, artifact: &Artifact) -> Result<()> {
        lock(&self.artifacts).insert(artifact.stage.clone(), artifact.content.clone());
        lock(&self.writes).push(artifact.stage.clone());
        Ok(())
    }

    fn read(&self, stage: &str) -> Result<Option<String>> {
        Ok(lock(&self.artifacts).get(stage).cloned())
    }
}
