//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Run the full pipeline (default when no command is given)
//! - `check` - Validate the configuration file
//! - `inspect` - Summarize a table written to a local output root

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
