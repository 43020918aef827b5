//! Dependency-ordered stage execution for neuroprompt
//!
//! Stages implement [`Stage`] and are assembled into a [`PipelineGraph`],
//! which rejects duplicate names, undeclared dependencies and cycles before
//! anything runs. [`PipelineExecutor`] then runs the graph in topological
//! order, persisting each [`Artifact`] through an [`ArtifactStore`] before
//! any dependent stage starts.

mod artifact;
mod cancel;
mod executor;
mod graph;
mod stage;
mod store;

pub use artifact::{Artifact, content_hash};
pub use cancel::CancelFlag;
pub use executor::{PipelineExecutor, PipelineFailure, PipelineRun, new_run_id};
pub use graph::PipelineGraph;
pub use neuroprompt_utils::error::PipelineError;
pub use stage::{Stage, StageInputs};
pub use store::{
    ArtifactStore, FsArtifactStore, InMemoryArtifactStore, MANIFEST_FILE, Manifest, ManifestEntry,
};
