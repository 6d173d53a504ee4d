//! Table writer
//!
//! Hands a query to the engine as a `COPY ... TO` statement so the result is
//! written straight to Parquet, partitioned the way the target table asks.

use super::location::{OutputRoot, TableTarget};
use crate::config::{ParquetCompression, WriteMode};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::sql;
use crate::tables::Table;
use serde::Serialize;

/// Outcome of writing one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableWriteSummary {
    /// Table written
    pub table: Table,
    /// Directory the table was written to
    pub location: String,
    /// Rows written
    pub rows: usize,
    /// Whether existing data was replaced
    pub replaced: bool,
}

/// Writes query results as Parquet tables under one output root
pub struct TableWriter<'a> {
    session: &'a Session,
    root: &'a OutputRoot,
    mode: WriteMode,
    compression: ParquetCompression,
}

impl<'a> TableWriter<'a> {
    /// Create a writer with default compression
    pub fn new(session: &'a Session, root: &'a OutputRoot, mode: WriteMode) -> Self {
        Self {
            session,
            root,
            mode,
            compression: ParquetCompression::default(),
        }
    }

    /// Set the Parquet codec
    #[must_use]
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Write the result of `query` as `table`
    ///
    /// The query must produce every column of the table, partition columns
    /// included; the engine moves those into the directory names.
    pub async fn write(&self, table: Table, query: &str) -> Result<TableWriteSummary> {
        let target = self.root.table(table);
        let replaced = self.claim(&target).await?;

        target.prepare()?;
        let statement = copy_statement(table, query, &target, self.compression);
        let rows = self
            .session
            .execute(&format!("writing {table}"), &statement)?;

        tracing::info!(
            table = %table,
            rows,
            location = %target.location(),
            "Table written"
        );

        Ok(TableWriteSummary {
            table,
            location: target.location(),
            rows,
            replaced,
        })
    }

    /// Apply the write mode to a target that may already hold data
    async fn claim(&self, target: &TableTarget) -> Result<bool> {
        if !target.exists().await? {
            return Ok(false);
        }
        match self.mode {
            WriteMode::ErrorIfExists => Err(Error::target_exists(target.location())),
            WriteMode::Overwrite => {
                let removed = target.clear().await?;
                tracing::warn!(
                    table = %target.table(),
                    removed,
                    location = %target.location(),
                    "Overwriting existing table"
                );
                Ok(true)
            }
        }
    }
}

/// Build the `COPY` statement writing `query` to `target`
pub fn copy_statement(
    table: Table,
    query: &str,
    target: &TableTarget,
    compression: ParquetCompression,
) -> String {
    let projection = sql::column_list(table.columns());
    let source = format!("SELECT {projection} FROM ({query}) AS src");
    let codec = compression.sql_name();

    if table.is_partitioned() {
        format!(
            "COPY ({source}) TO {} (FORMAT PARQUET, COMPRESSION '{codec}', PARTITION_BY ({}))",
            sql::literal(&target.location()),
            table.partition_by().join(", "),
        )
    } else {
        format!(
            "COPY ({source}) TO {} (FORMAT PARQUET, COMPRESSION '{codec}')",
            sql::literal(&target.file_location()),
        )
    }
}
