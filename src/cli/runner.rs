//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::output::{inspect_table, OutputRoot};
use crate::pipeline::Pipeline;
use crate::tables::Table;
use serde::Serialize;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match self.cli.command.clone().unwrap_or(Commands::Run) {
            Commands::Run => self.run_pipeline().await,
            Commands::Check => self.check(),
            Commands::Inspect { table } => self.inspect(table),
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<PipelineConfig> {
        PipelineConfig::from_file(&self.cli.config)
    }

    /// Run the pipeline and print the run summary
    async fn run_pipeline(&self) -> Result<()> {
        let config = self.load_config()?;
        let summary = Pipeline::new(config).run().await?;
        self.output(&summary)
    }

    /// Validate configuration
    fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        self.output(&config.summary())
    }

    /// Inspect a written table
    fn inspect(&self, table: Table) -> Result<()> {
        let config = self.load_config()?;
        let root = OutputRoot::parse(&config.output_root, config.credentials.as_ref())?;
        let path = root.local_path().ok_or_else(|| {
            Error::config(format!(
                "inspect reads local output only; '{}' is remote",
                config.output_root
            ))
        })?;
        let report = inspect_table(path, table)?;
        self.output(&report)
    }

    /// Print a result in the selected format
    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        println!("{text}");
        Ok(())
    }
}
