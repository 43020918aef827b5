use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of one stage: text content plus stage name and completion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub stage: String,
    pub content: String,
    pub completed_at: DateTime<Utc>,
    /// BLAKE3 hex digest of `content`
    pub blake3_hash: String,
}

impl Artifact {
    /// Create an artifact stamped with the current time and a BLAKE3 hash
    #[must_use]
    pub fn new(stage: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(stage, content, Utc::now())
    }

    #[must_use]
    pub fn at(stage: impl Into<String>, content: impl Into<String>, completed_at: DateTime<Utc>) -> Self {
        let content = content.into();
        let blake3_hash = content_hash(&content);
        Self {
            stage: stage.into(),
            content,
            completed_at,
            blake3_hash,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// BLAKE3 hex digest of a text
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content.as_bytes());
    hasher.finalize().to_hex().to_string()
}
