//! Output tables of the star schema
//!
//! Each table knows its directory name under the output root, the columns
//! it carries, and the columns it is partitioned by. Partition columns are
//! not stored inside the data files; they are recovered from the Hive-style
//! `column=value/` directories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A table written by the pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    /// One row per distinct song
    Songs,
    /// One row per distinct artist
    Artists,
    /// One row per distinct user and level
    Users,
    /// One row per distinct play timestamp
    Time,
    /// Fact table: one row per play matched to the catalog
    Songplays,
}

impl Table {
    /// All tables, in the order a run writes them
    pub const ALL: [Table; 5] = [
        Table::Songs,
        Table::Artists,
        Table::Users,
        Table::Time,
        Table::Songplays,
    ];

    /// Directory name under the output root
    pub fn name(self) -> &'static str {
        match self {
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Users => "users",
            Table::Time => "time",
            Table::Songplays => "songplays",
        }
    }

    /// Every column of the relation, partition columns included
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Songs => &["song_id", "title", "artist_id", "year", "duration"],
            Table::Artists => &[
                "artist_id",
                "artist_name",
                "artist_location",
                "artist_latitude",
                "artist_longitude",
            ],
            Table::Users => &["userId", "firstName", "lastName", "gender", "level"],
            Table::Time => &[
                "start_time",
                "hour",
                "day",
                "week",
                "month",
                "year",
                "weekday",
            ],
            Table::Songplays => &[
                "songplay_id",
                "start_time",
                "userId",
                "level",
                "sessionId",
                "location",
                "userAgent",
                "song_id",
                "artist_id",
                "year",
                "month",
            ],
        }
    }

    /// Columns encoded in the directory layout, outermost first
    pub fn partition_by(self) -> &'static [&'static str] {
        match self {
            Table::Songs => &["year", "artist_id"],
            Table::Time | Table::Songplays => &["year", "month"],
            Table::Artists | Table::Users => &[],
        }
    }

    /// Whether the table is written as Hive-style partitions
    pub fn is_partitioned(self) -> bool {
        !self.partition_by().is_empty()
    }

    /// Columns physically stored in the data files
    pub fn data_columns(self) -> Vec<&'static str> {
        let partitions = self.partition_by();
        self.columns()
            .iter()
            .copied()
            .filter(|c| !partitions.contains(c))
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
