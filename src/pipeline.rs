//! Pipeline driver
//!
//! Provisions the engine session, then runs the catalog stage followed by
//! the event stage against one output root. A failed run is not resumable:
//! tables written before the failure stay where they are, and the next run
//! starts from scratch.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output::{OutputRoot, TableWriteSummary, TableWriter};
use crate::session::Session;
use crate::transform::{CatalogTransformer, EventTransformer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier derived from the start time
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Output root written to
    pub output_root: String,
    /// Every table written, in write order
    pub tables: Vec<TableWriteSummary>,
}

impl RunSummary {
    /// Summary of one table, if it was written
    pub fn table(&self, table: crate::tables::Table) -> Option<&TableWriteSummary> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Runs the whole ETL for one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline for a validated configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run both stages
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let started_at = Utc::now();
        let run_id = started_at.format("%Y%m%dT%H%M%SZ").to_string();
        let start = Instant::now();
        tracing::info!(
            run_id = %run_id,
            output = %self.config.output_root,
            write_mode = ?self.config.write_mode,
            "Starting pipeline run"
        );

        let session = Session::get_or_create(&self.config)?;
        let root = OutputRoot::parse(&self.config.output_root, self.config.credentials.as_ref())?;
        let writer = TableWriter::new(&session, &root, self.config.write_mode)
            .with_compression(self.config.compression);

        let catalog = CatalogTransformer::new(&self.config.song_input)
            .run(&session, &writer)
            .await?;

        let events = EventTransformer::new(&self.config.log_input)
            .with_timezone(self.config.timezone.clone())
            .run(&session, &writer, &catalog.relation)
            .await?;

        session.release(events.plays)?;
        session.release(catalog.relation)?;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            output_root: self.config.output_root.clone(),
            tables: vec![
                catalog.songs,
                catalog.artists,
                events.users,
                events.time,
                events.songplays,
            ],
        };

        tracing::info!(
            run_id = %summary.run_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(summary)
    }
}
