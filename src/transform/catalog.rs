//! Song catalog stage
//!
//! Raw catalog records carry song and artist attributes side by side. Whole
//! records are deduplicated first; only then are the narrower `songs` and
//! `artists` projections taken. Deduplicating after projection would merge
//! records that merely agree on the projected columns.

use crate::error::Result;
use crate::output::{TableWriteSummary, TableWriter};
use crate::session::{Relation, Session};
use crate::sql;
use crate::tables::Table;

/// Layout of catalog files below the input root
pub const SONG_FILE_GLOB: &str = "*/*/*/*.json";

/// Result of the catalog stage
#[derive(Debug)]
pub struct CatalogOutput {
    /// Deduplicated raw catalog records, handed to the event stage
    pub relation: Relation,
    pub songs: TableWriteSummary,
    pub artists: TableWriteSummary,
}

/// Reads song catalog files and writes the `songs` and `artists` tables
#[derive(Debug, Clone)]
pub struct CatalogTransformer {
    input: String,
}

impl CatalogTransformer {
    /// Create a stage reading below `input`
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Glob matched against the input root
    pub fn source_glob(&self) -> String {
        sql::join_path(&self.input, SONG_FILE_GLOB)
    }

    /// Run the stage
    pub async fn run(&self, session: &Session, writer: &TableWriter<'_>) -> Result<CatalogOutput> {
        let glob = self.source_glob();
        tracing::info!(source = %glob, "Loading song catalog");

        // Read once, used by both projections and by the event stage
        let relation = session.materialize("catalog", &catalog_query(&glob))?;
        tracing::info!(rows = relation.rows(), "Catalog records deduplicated");

        let songs = writer.write(Table::Songs, &songs_query(&relation)).await?;
        let artists = writer
            .write(Table::Artists, &artists_query(&relation))
            .await?;

        Ok(CatalogOutput {
            relation,
            songs,
            artists,
        })
    }
}

/// Every distinct raw record matched by `glob`
pub fn catalog_query(glob: &str) -> String {
    format!("SELECT DISTINCT * FROM {}", sql::read_json(glob))
}

/// Distinct songs of the catalog relation
pub fn songs_query(catalog: &Relation) -> String {
    format!(
        "SELECT DISTINCT {} FROM {}",
        sql::column_list(Table::Songs.columns()),
        catalog.sql_name()
    )
}

/// Distinct artists of the catalog relation
pub fn artists_query(catalog: &Relation) -> String {
    format!(
        "SELECT DISTINCT {} FROM {}",
        sql::column_list(Table::Artists.columns()),
        catalog.sql_name()
    )
}
