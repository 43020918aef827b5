//! Command-line interface for neuroprompt
//!
//! - `args`: clap argument definitions
//! - `run`: entry point, input handling and output

pub mod args;
mod run;

pub use args::Cli;
pub use run::run;
