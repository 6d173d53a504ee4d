//! Tests for output module

use super::*;
use crate::config::{ParquetCompression, PipelineConfig, WriteMode};
use crate::error::Error;
use crate::session::Session;
use crate::tables::Table;
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::tempdir;

fn session() -> Session {
    Session::open(&PipelineConfig::new("/in/songs", "/in/logs", "/out")).unwrap()
}

fn root_at(dir: &Path) -> OutputRoot {
    OutputRoot::local(dir.to_str().unwrap())
}

const SONGS_QUERY: &str = "SELECT * FROM (VALUES \
    ('S1', 'First', 'A1', 2000, 200.5), \
    ('S2', 'Second', 'A1', 2000, 180.0), \
    ('S3', 'Third', 'A2', 1999, 240.0)) \
    AS t(song_id, title, artist_id, year, duration)";

const USERS_QUERY: &str = "SELECT * FROM (VALUES \
    ('U1', 'Ada', 'Lovelace', 'F', 'free'), \
    ('U2', 'Alan', 'Turing', 'M', 'paid')) \
    AS t(userId, firstName, lastName, gender, level)";

// ============================================================================
// COPY Statement Tests
// ============================================================================

#[test]
fn test_copy_statement_partitioned() {
    let root = OutputRoot::local("/out");
    let target = root.table(Table::Songs);
    let sql = copy_statement(Table::Songs, "SELECT 1", &target, ParquetCompression::Snappy);

    assert!(sql.starts_with("COPY (SELECT \"song_id\", \"title\", \"artist_id\", \"year\", \"duration\" FROM (SELECT 1) AS src)"));
    assert!(sql.contains("TO '/out/songs'"));
    assert!(sql.contains("PARTITION_BY (year, artist_id)"));
    assert!(sql.contains("COMPRESSION 'SNAPPY'"));
}

#[test]
fn test_copy_statement_unpartitioned() {
    let root = OutputRoot::local("/out");
    let target = root.table(Table::Artists);
    let sql = copy_statement(Table::Artists, "SELECT 1", &target, ParquetCompression::Zstd);

    assert!(sql.contains("TO '/out/artists/data_0.parquet'"));
    assert!(!sql.contains("PARTITION_BY"));
    assert!(sql.contains("COMPRESSION 'ZSTD'"));
}

// ============================================================================
// Writer Tests
// ============================================================================

#[tokio::test]
async fn test_write_partitioned_table() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);

    let summary = writer.write(Table::Songs, SONGS_QUERY).await.unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.table, Table::Songs);
    assert!(!summary.replaced);

    let songs_dir = dir.path().join("songs");
    assert!(songs_dir.join("year=2000").join("artist_id=A1").is_dir());
    assert!(songs_dir.join("year=1999").join("artist_id=A2").is_dir());

    let files = list_data_files(&songs_dir).unwrap();
    assert_eq!(files.iter().map(|f| f.rows).sum::<usize>(), 3);
    for file in &files {
        assert_eq!(
            file.partition.keys().cloned().collect::<Vec<_>>(),
            vec!["artist_id".to_string(), "year".to_string()]
        );
    }
}

#[tokio::test]
async fn test_partition_columns_live_in_directories_only() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);
    writer.write(Table::Songs, SONGS_QUERY).await.unwrap();

    let files = list_data_files(&dir.path().join("songs")).unwrap();
    let columns = file_columns(&files[0].path).unwrap();
    assert_eq!(columns, vec!["song_id", "title", "duration"]);
}

#[tokio::test]
async fn test_partition_round_trip() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);
    writer.write(Table::Songs, SONGS_QUERY).await.unwrap();

    // Rebuild (song_id, year, artist_id) from file contents plus directory names
    let mut rebuilt = Vec::new();
    for file in list_data_files(&dir.path().join("songs")).unwrap() {
        let batches = read_batches(&file.path).unwrap();
        for song_id in column_strings(&batches, "song_id").unwrap() {
            rebuilt.push((
                song_id,
                file.partition["year"].clone(),
                file.partition["artist_id"].clone(),
            ));
        }
    }
    rebuilt.sort();

    let expected = vec![
        ("S1".to_string(), "2000".to_string(), "A1".to_string()),
        ("S2".to_string(), "2000".to_string(), "A1".to_string()),
        ("S3".to_string(), "1999".to_string(), "A2".to_string()),
    ];
    assert_eq!(rebuilt, expected);
}

#[tokio::test]
async fn test_write_unpartitioned_table() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);

    let summary = writer.write(Table::Users, USERS_QUERY).await.unwrap();
    assert_eq!(summary.rows, 2);

    let file = dir.path().join("users").join(UNPARTITIONED_FILE);
    assert!(file.is_file());

    let batches = read_batches(&file).unwrap();
    let mut ids = column_strings(&batches, "userId").unwrap();
    ids.sort();
    assert_eq!(ids, vec!["U1", "U2"]);
}

#[tokio::test]
async fn test_existing_target_fails_by_default() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);

    writer.write(Table::Users, USERS_QUERY).await.unwrap();
    let err = writer.write(Table::Users, USERS_QUERY).await.unwrap_err();
    assert!(matches!(err, Error::TargetExists { .. }));

    // The first write is left untouched
    let report = inspect_table(dir.path(), Table::Users).unwrap();
    assert_eq!(report.rows, 2);
}

#[tokio::test]
async fn test_overwrite_replaces_existing_target() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());

    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);
    writer.write(Table::Songs, SONGS_QUERY).await.unwrap();

    let writer = TableWriter::new(&session, &root, WriteMode::Overwrite);
    let summary = writer
        .write(
            Table::Songs,
            "SELECT 'S9' AS song_id, 'Only' AS title, 'A9' AS artist_id, 2010 AS year, 1.0 AS duration",
        )
        .await
        .unwrap();
    assert!(summary.replaced);
    assert_eq!(summary.rows, 1);

    let report = inspect_table(dir.path(), Table::Songs).unwrap();
    assert_eq!(report.rows, 1);
    assert_eq!(report.partitions.len(), 1);
    assert_eq!(report.partitions[0]["artist_id"], "A9");
    assert!(!dir.path().join("songs").join("year=2000").exists());
}

#[tokio::test]
async fn test_missing_column_is_engine_error() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);

    let err = writer
        .write(Table::Users, "SELECT 'U1' AS userId")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
}

// ============================================================================
// Inspection Tests
// ============================================================================

#[test]
fn test_partition_values_from_path() {
    let root = Path::new("/out/time");
    let file = Path::new("/out/time/year=2018/month=11/data_0.parquet");
    let values = partition_values(root, file);
    assert_eq!(values["year"], "2018");
    assert_eq!(values["month"], "11");
    assert_eq!(values.len(), 2);
}

#[test]
fn test_partition_values_unpartitioned() {
    let root = Path::new("/out/users");
    let file = Path::new("/out/users/data_0.parquet");
    assert!(partition_values(root, file).is_empty());
}

#[test]
fn test_inspect_missing_table() {
    let dir = tempdir().unwrap();
    let report = inspect_table(dir.path(), Table::Songplays).unwrap();
    assert_eq!(report.files, 0);
    assert_eq!(report.rows, 0);
    assert!(report.columns.is_empty());
}

#[tokio::test]
async fn test_column_strings_unknown_column() {
    let dir = tempdir().unwrap();
    let session = session();
    let root = root_at(dir.path());
    let writer = TableWriter::new(&session, &root, WriteMode::ErrorIfExists);
    writer.write(Table::Users, USERS_QUERY).await.unwrap();

    let batches = read_batches(&dir.path().join("users").join(UNPARTITIONED_FILE)).unwrap();
    let err = column_strings(&batches, "no_such_column").unwrap_err();
    assert!(matches!(err, Error::Output { .. }));
}
