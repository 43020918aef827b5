//! Configuration for neuroprompt
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults.

mod config;

pub use config::*;
pub use neuroprompt_utils::error::ConfigError;
