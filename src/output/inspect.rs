//! Read back written tables
//!
//! Walks a local table directory, recovers the Hive partition values from
//! the `column=value` path segments, and reads the Parquet files with the
//! `parquet` crate. Used by the `inspect` command and by tests that check
//! what actually landed on disk.

use crate::error::{Result, ResultExt};
use crate::tables::Table;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Partition values of one data file, keyed by column
pub type PartitionValues = BTreeMap<String, String>;

/// One Parquet file of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    /// Path of the file
    pub path: PathBuf,
    /// Values recovered from the directory names
    pub partition: PartitionValues,
    /// Rows stored in the file
    pub rows: usize,
}

/// Summary of a table as found on disk
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: Table,
    pub location: String,
    pub files: usize,
    pub rows: usize,
    /// Distinct partitions holding data
    pub partitions: Vec<PartitionValues>,
    /// Columns stored inside the files
    pub columns: Vec<String>,
}

/// List every Parquet file below `dir`, sorted by path
pub fn list_data_files(dir: &Path) -> Result<Vec<DataFile>> {
    let mut paths = Vec::new();
    collect_parquet(dir, &mut paths)?;
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let partition = partition_values(dir, &path);
            let rows = row_count(&path)?;
            Ok(DataFile {
                path,
                partition,
                rows,
            })
        })
        .collect()
}

fn collect_parquet(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_parquet(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}

/// Partition values encoded between `root` and `file`
pub fn partition_values(root: &Path, file: &Path) -> PartitionValues {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| {
            let segment = c.as_os_str().to_str()?;
            let (key, value) = segment.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Row count from the file footer
fn row_count(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = SerializedFileReader::new(file)?;
    Ok(reader.metadata().file_metadata().num_rows() as usize)
}

/// Read every record batch of one Parquet file
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Column names stored in one Parquet file
pub fn file_columns(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    Ok(builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect())
}

/// Render one column of a set of batches as strings (`""` for nulls)
pub fn column_strings(batches: &[RecordBatch], column: &str) -> Result<Vec<String>> {
    let mut values = Vec::new();
    for batch in batches {
        let array = batch.column_by_name(column).ok_or_else(|| {
            crate::error::Error::output(format!("Column '{column}' not found in batch"))
        })?;
        for row in 0..batch.num_rows() {
            values.push(array_value_to_string(array, row)?);
        }
    }
    Ok(values)
}

/// Summarize a table written under a local output root
pub fn inspect_table(root: &Path, table: Table) -> Result<TableReport> {
    let dir = root.join(table.name());
    let files = list_data_files(&dir)?;

    let rows = files.iter().map(|f| f.rows).sum();
    let partitions: BTreeSet<PartitionValues> = files
        .iter()
        .filter(|f| f.rows > 0 && !f.partition.is_empty())
        .map(|f| f.partition.clone())
        .collect();
    let columns = match files.first() {
        Some(file) => file_columns(&file.path)?,
        None => Vec::new(),
    };

    Ok(TableReport {
        table,
        location: dir.display().to_string(),
        files: files.len(),
        rows,
        partitions: partitions.into_iter().collect(),
        columns,
    })
}
