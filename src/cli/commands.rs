//! CLI commands and argument parsing

use crate::config::DEFAULT_CONFIG_FILE;
use crate::tables::Table;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sparkify star-schema ETL
#[derive(Parser, Debug)]
#[command(name = "sparkify-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (KEY=VALUE)
    #[arg(short = 'C', long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output format for command results
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output (debug logging, including every SQL statement)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the full pipeline
    Run,

    /// Validate the configuration file and print it with secrets masked
    Check,

    /// Summarize a table written under a local output root
    Inspect {
        /// Table to inspect
        #[arg(value_enum)]
        table: Table,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON (one document per line)
    Json,
    /// Indented JSON
    Pretty,
}
