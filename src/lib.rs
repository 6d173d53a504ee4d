// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]

//! # Sparkify ETL
//!
//! Extracts song catalog records and listening-session logs from object
//! storage, reshapes them into a star schema, and writes the tables as
//! partitioned Parquet for downstream analytics.
//!
//! ## Features
//!
//! - **Embedded engine**: DuckDB reads the JSON, deduplicates, joins and
//!   writes Parquet; the crate composes SQL and sequences the stages
//! - **Cloud or local**: S3 (or an S3-compatible endpoint) or a local directory
//! - **Explicit configuration**: one config struct, no environment mutation
//! - **Safe writes**: existing tables are never replaced unless asked to
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sparkify_etl::{Pipeline, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::from_file("environment.cfg")?;
//!     let summary = Pipeline::new(config).run().await?;
//!     for table in &summary.tables {
//!         println!("{}: {} rows", table.table, table.rows);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Pipeline Driver                        │
//! │      Session → CatalogTransformer → EventTransformer          │
//! └───────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//! ┌────────┴───────┬────────────┴──────────┬──────────┴──────────┐
//! │    Session     │      Catalog          │       Events        │
//! ├────────────────┼───────────────────────┼─────────────────────┤
//! │ DuckDB         │ dedup raw records     │ filter NextSong     │
//! │ httpfs / S3    │ songs  (year, artist) │ users               │
//! │ temp relations │ artists               │ time   (year, month)│
//! │                │ → catalog relation ───┼→ songplays          │
//! └────────────────┴───────────────────────┴─────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Pipeline configuration
pub mod config;

/// SQL text helpers
pub mod sql;

/// Star-schema tables
pub mod tables;

/// Engine session provisioning
pub mod session;

/// Output locations, Parquet writing and read-back
pub mod output;

/// Catalog and event transformation stages
pub mod transform;

/// Pipeline driver
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{PipelineConfig, StorageCredentials, TimeZoneSetting, WriteMode};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use session::{Relation, Session};
pub use tables::Table;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
