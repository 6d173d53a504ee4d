//! Output module
//!
//! Handles where tables go and how they get there.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Resolving table locations under a local or S3 output root
//! - Enforcing the write mode (fail or replace when data already exists)
//! - Writing query results as (partitioned) Parquet through the engine
//! - Reading written tables back for inspection

mod inspect;
mod location;
mod writer;

pub use inspect::{
    column_strings, file_columns, inspect_table, list_data_files, partition_values, read_batches,
    DataFile, PartitionValues, TableReport,
};
pub use location::{
    check_location, is_remote, OutputRoot, TableTarget, REMOTE_SCHEMES, UNPARTITIONED_FILE,
};
pub use writer::{copy_statement, TableWriteSummary, TableWriter};

#[cfg(test)]
mod tests;
