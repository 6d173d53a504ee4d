//! Listening-session log stage
//!
//! Only `NextSong` events are plays; every table of this stage is derived
//! from that filtered relation. Calendar fields come from the `ts` epoch
//! milliseconds, read in the configured time zone. The fact table joins
//! plays to the catalog on exact, case-sensitive artist name equality;
//! plays without a matching name (or without an artist) are dropped.

use crate::config::TimeZoneSetting;
use crate::error::Result;
use crate::output::{TableWriteSummary, TableWriter};
use crate::session::{Relation, Session};
use crate::sql;
use crate::tables::Table;

/// Layout of log files below the input root
pub const LOG_FILE_GLOB: &str = "*/*/*events.json";

/// Page value marking a song play
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Result of the event stage
#[derive(Debug)]
pub struct EventOutput {
    /// Deduplicated play events
    pub plays: Relation,
    pub users: TableWriteSummary,
    pub time: TableWriteSummary,
    pub songplays: TableWriteSummary,
}

/// Reads event logs and writes `users`, `time` and `songplays`
#[derive(Debug, Clone)]
pub struct EventTransformer {
    input: String,
    timezone: TimeZoneSetting,
}

impl EventTransformer {
    /// Create a stage reading below `input`, deriving calendar fields in UTC
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            timezone: TimeZoneSetting::Utc,
        }
    }

    /// Derive calendar fields in another zone
    #[must_use]
    pub fn with_timezone(mut self, timezone: TimeZoneSetting) -> Self {
        self.timezone = timezone;
        self
    }

    /// Glob matched against the input root
    pub fn source_glob(&self) -> String {
        sql::join_path(&self.input, LOG_FILE_GLOB)
    }

    /// Run the stage against the catalog relation of this run
    pub async fn run(
        &self,
        session: &Session,
        writer: &TableWriter<'_>,
        catalog: &Relation,
    ) -> Result<EventOutput> {
        let glob = self.source_glob();
        tracing::info!(source = %glob, timezone = %self.timezone.name(), "Loading event logs");

        // Read once, used by users, time and songplays
        let plays = session.materialize("plays", &plays_query(&glob))?;
        tracing::info!(rows = plays.rows(), "Play events selected");

        let users = writer.write(Table::Users, &users_query(&plays)).await?;
        let time = writer
            .write(Table::Time, &time_query(&plays, &self.timezone))
            .await?;
        let songplays = writer
            .write(
                Table::Songplays,
                &songplays_query(&plays, catalog, &self.timezone),
            )
            .await?;

        if songplays.rows == 0 && plays.rows() > 0 {
            tracing::warn!(
                plays = plays.rows(),
                "No play matched a catalog artist name; songplays is empty"
            );
        }

        Ok(EventOutput {
            plays,
            users,
            time,
            songplays,
        })
    }
}

/// Distinct raw events matched by `glob`, restricted to song plays
pub fn plays_query(glob: &str) -> String {
    format!(
        "SELECT * FROM (SELECT DISTINCT * FROM {}) AS raw WHERE \"page\" = {}",
        sql::read_json(glob),
        sql::literal(NEXT_SONG_PAGE)
    )
}

/// Distinct users appearing in play events
pub fn users_query(plays: &Relation) -> String {
    format!(
        "SELECT DISTINCT {} FROM {}",
        sql::column_list(Table::Users.columns()),
        plays.sql_name()
    )
}

/// Timestamp expression for the `ts` column in the given zone
pub fn start_time_expr(timezone: &TimeZoneSetting) -> String {
    let utc = "epoch_ms(CAST(\"ts\" AS BIGINT))";
    match timezone {
        TimeZoneSetting::Utc => utc.to_string(),
        TimeZoneSetting::Named(name) => format!(
            "timezone({}, timezone('UTC', {utc}))",
            sql::literal(name)
        ),
    }
}

/// Plays with their derived `start_time`
fn timed_plays(plays: &Relation, timezone: &TimeZoneSetting) -> String {
    format!(
        "SELECT *, {} AS start_time FROM {}",
        start_time_expr(timezone),
        plays.sql_name()
    )
}

/// Distinct play timestamps with their calendar fields
///
/// `week` is the ISO week of the year; `weekday` runs from 1 (Sunday) to
/// 7 (Saturday).
pub fn time_query(plays: &Relation, timezone: &TimeZoneSetting) -> String {
    format!(
        "WITH timed AS ({}) \
         SELECT DISTINCT start_time, \
             hour(start_time) AS \"hour\", \
             day(start_time) AS \"day\", \
             weekofyear(start_time) AS \"week\", \
             month(start_time) AS \"month\", \
             year(start_time) AS \"year\", \
             dayofweek(start_time) + 1 AS \"weekday\" \
         FROM timed",
        timed_plays(plays, timezone)
    )
}

/// Plays joined to the catalog by artist name, one row per distinct match
///
/// `songplay_id` is numbered over a fixed ordering of the matched rows, so
/// ids are unique and increase with `start_time`.
pub fn songplays_query(
    plays: &Relation,
    catalog: &Relation,
    timezone: &TimeZoneSetting,
) -> String {
    format!(
        "WITH timed AS ({timed}), \
         artist_songs AS (\
             SELECT DISTINCT song_id, artist_id, artist_name FROM {catalog}\
         ), \
         matched AS (\
             SELECT DISTINCT e.start_time, e.\"userId\", e.\"level\", e.\"sessionId\", \
                 e.\"location\", e.\"userAgent\", s.song_id, s.artist_id, \
                 year(e.start_time) AS \"year\", month(e.start_time) AS \"month\" \
             FROM timed AS e \
             INNER JOIN artist_songs AS s ON s.artist_name = e.\"artist\"\
         ) \
         SELECT row_number() OVER (\
             ORDER BY start_time, \"userId\", \"sessionId\", song_id, artist_id, \
                 \"level\", \"location\", \"userAgent\"\
         ) AS songplay_id, * \
         FROM matched",
        timed = timed_plays(plays, timezone),
        catalog = catalog.sql_name(),
    )
}
