//! Transformation stages
//!
//! Two stages turn raw JSON into the star schema:
//! - [`CatalogTransformer`] reads song records and writes `songs` and
//!   `artists`, returning the deduplicated catalog relation.
//! - [`EventTransformer`] reads listening-session logs and writes `users`,
//!   `time` and the `songplays` fact table, joining against the catalog
//!   relation it is handed.
//!
//! Each stage composes SQL and lets the engine do the work. Relations that
//! feed several outputs are materialized once; everything else is a query
//! string consumed directly by a `COPY`.

mod catalog;
mod events;

pub use catalog::{
    artists_query, catalog_query, songs_query, CatalogOutput, CatalogTransformer, SONG_FILE_GLOB,
};
pub use events::{
    plays_query, songplays_query, start_time_expr, time_query, users_query, EventOutput,
    EventTransformer, LOG_FILE_GLOB, NEXT_SONG_PAGE,
};
