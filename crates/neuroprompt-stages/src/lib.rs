//! The four prompt-generation stages
//!
//! Every stage is a [`CompletionStage`]: render messages from
//! [`StageTemplates`], ask the resilient client for one completion, return the
//! trimmed text. The embedded [`frameworks`] and [`criteria`] feed the default
//! templates.

mod completion;
pub mod criteria;
pub mod frameworks;
mod templates;

pub use completion::CompletionStage;
pub use templates::{DefaultTemplates, StageTemplates};

pub const RESEARCH: &str = "research";
pub const GENERATE: &str = "generate";
pub const CRITIQUE: &str = "critique";
pub const OPTIMIZE: &str = "optimize";

/// Stage names with their dependencies, in declaration order
pub const STAGE_GRAPH: [(&str, &[&str]); 4] = [
    (RESEARCH, &[]),
    (GENERATE, &[RESEARCH]),
    (CRITIQUE, &[GENERATE]),
    (OPTIMIZE, &[GENERATE, CRITIQUE]),
];

/// File each stage's artifact is written to inside the artifacts directory
#[must_use]
pub fn artifact_file_name(stage: &str) -> Option<&'static str> {
    match stage {
        RESEARCH => Some("research.md"),
        GENERATE => Some("generated_prompt.txt"),
        CRITIQUE => Some("prompt_critique.txt"),
        OPTIMIZE => Some("final_prompt.txt"),
        _ => None,
    }
}
