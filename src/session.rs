//! Engine session provisioning
//!
//! A [`Session`] is a connection to an embedded DuckDB database. DuckDB does
//! all reading, deduplication, joining and Parquet writing; this module only
//! sets it up (storage connector, credentials, time-zone support) and offers
//! a handful of helpers for running statements and materializing relations.
//!
//! Credentials are injected with `SET` statements on the connection itself.
//! The process environment is never read or written for them.

use crate::config::{PipelineConfig, StorageCredentials, TimeZoneSetting, KEY_TIMEZONE};
use crate::error::{Error, Result};
use crate::sql;
use duckdb::Connection;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Database shared by every [`Session::get_or_create`] caller in the process
static SHARED: OnceCell<Mutex<Connection>> = OnceCell::new();

/// Suffix counter for temporary relation names
static RELATION_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A relation materialized inside a session
///
/// Materialized relations are read once from their source and then reused
/// by several downstream queries. They live as temporary tables, visible
/// only on the connection that created them, and disappear with it.
#[derive(Debug, PartialEq, Eq)]
pub struct Relation {
    name: String,
    rows: usize,
}

impl Relation {
    /// Table name inside the session
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted name for use in SQL text
    pub fn sql_name(&self) -> String {
        sql::ident(&self.name)
    }

    /// Number of rows at materialization time
    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Handle to the processing engine
pub struct Session {
    /// DuckDB connection
    conn: Connection,
    /// Whether the connection reuses the process-wide database
    shared: bool,
}

impl Session {
    /// Open a fresh, isolated in-memory engine
    pub fn open(config: &PipelineConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;
        let session = Self {
            conn,
            shared: false,
        };
        session.configure(config)?;
        Ok(session)
    }

    /// Connect to the process-wide engine, creating it on first use
    ///
    /// Every call returns its own connection to the same database, so
    /// temporary relations stay private to the caller. The database is
    /// configured once: storage settings and extensions of the first
    /// configuration stay in effect for every later caller. Time-zone names
    /// are checked on every call.
    pub fn get_or_create(config: &PipelineConfig) -> Result<Self> {
        let shared = SHARED.get_or_try_init(|| -> Result<Mutex<Connection>> {
            tracing::debug!("Creating process-wide DuckDB database");
            let conn = Connection::open_in_memory().map_err(|e| {
                Error::config(format!("Failed to create DuckDB connection: {e}"))
            })?;
            let session = Self { conn, shared: true };
            session.configure(config)?;
            Ok(Mutex::new(session.conn))
        })?;

        let conn = shared
            .lock()
            .map_err(|_| Error::Other("Shared DuckDB connection lock poisoned".to_string()))?
            .try_clone()
            .map_err(|e| Error::config(format!("Failed to connect to shared DuckDB: {e}")))?;

        let session = Self { conn, shared: true };
        session.configure_timezone(&config.timezone)?;
        Ok(session)
    }

    /// Whether this session is connected to the process-wide database
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Apply configuration to a newly created database
    fn configure(&self, config: &PipelineConfig) -> Result<()> {
        if config.requires_remote_storage() {
            self.load_extension("httpfs")?;
            if let Some(credentials) = &config.credentials {
                self.configure_storage(credentials)?;
            }
        }
        self.configure_timezone(&config.timezone)
    }

    /// Load time-zone support and reject zone names the engine does not know
    fn configure_timezone(&self, timezone: &TimeZoneSetting) -> Result<()> {
        let TimeZoneSetting::Named(name) = timezone else {
            return Ok(());
        };
        self.load_extension("icu")?;

        let check = format!(
            "SELECT CAST(timezone({}, TIMESTAMPTZ '2000-01-01 00:00:00+00') AS VARCHAR)",
            sql::literal(name)
        );
        self.conn
            .query_row(&check, [], |row| row.get::<_, String>(0))
            .map_err(|e| {
                Error::invalid_value(KEY_TIMEZONE, format!("unknown time zone '{name}': {e}"))
            })?;
        tracing::debug!(timezone = %name, "Time zone support loaded");
        Ok(())
    }

    /// Install and load a DuckDB extension
    fn load_extension(&self, name: &str) -> Result<()> {
        self.conn
            .execute_batch(&format!("INSTALL {name}; LOAD {name};"))
            .map_err(|e| Error::config(format!("Failed to load {name} extension: {e}")))
    }

    /// Configure the S3-compatible storage connector
    fn configure_storage(&self, credentials: &StorageCredentials) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "SET s3_access_key_id = {}; SET s3_secret_access_key = {}; SET s3_region = {};",
                sql::literal(&credentials.access_key_id),
                sql::literal(&credentials.secret_access_key),
                sql::literal(&credentials.region),
            ))
            .map_err(|e| Error::config(format!("Failed to configure S3: {e}")))?;

        // Custom endpoint (R2, MinIO, etc.)
        if let Some(endpoint) = &credentials.endpoint {
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            self.conn
                .execute_batch(&format!(
                    "SET s3_endpoint = {}; SET s3_url_style = 'path';",
                    sql::literal(host)
                ))
                .map_err(|e| Error::config(format!("Failed to configure S3 endpoint: {e}")))?;
        }

        tracing::debug!(
            key_id = %credentials.masked_key_id(),
            region = %credentials.region,
            "Storage connector configured"
        );
        Ok(())
    }

    /// Execute a statement, returning the number of affected rows
    pub fn execute(&self, action: &str, statement: &str) -> Result<usize> {
        tracing::debug!(action, "Executing: {}", statement);
        self.conn
            .execute(statement, [])
            .map_err(|e| Error::query(action, e))
    }

    /// Count the rows a query returns
    pub fn count(&self, query: &str) -> Result<usize> {
        let statement = format!("SELECT COUNT(*) FROM ({query}) AS q");
        tracing::debug!("Executing: {}", statement);
        let count: i64 = self
            .conn
            .query_row(&statement, [], |row| row.get(0))
            .map_err(|e| Error::query("counting rows", e))?;
        Ok(count as usize)
    }

    /// Run a query once and keep its result for reuse
    pub fn materialize(&self, prefix: &str, query: &str) -> Result<Relation> {
        let seq = RELATION_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!("{prefix}_{seq}");
        let statement = format!("CREATE TEMP TABLE {} AS {query}", sql::ident(&name));
        self.execute(&format!("materializing {prefix}"), &statement)?;

        let rows = self.count(&format!("SELECT * FROM {}", sql::ident(&name)))?;
        tracing::debug!(relation = %name, rows, "Relation materialized");
        Ok(Relation { name, rows })
    }

    /// Drop a materialized relation
    pub fn release(&self, relation: Relation) -> Result<()> {
        self.execute(
            &format!("releasing {}", relation.name),
            &format!("DROP TABLE IF EXISTS {}", relation.sql_name()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> PipelineConfig {
        PipelineConfig::new("/in/songs", "/in/logs", "/out")
    }

    #[test]
    fn test_open_local_session() {
        let session = Session::open(&local_config()).unwrap();
        assert!(!session.is_shared());
        assert_eq!(session.count("SELECT 1 UNION ALL SELECT 2").unwrap(), 2);
    }

    #[test]
    fn test_materialize_and_release() {
        let session = Session::open(&local_config()).unwrap();
        let relation = session
            .materialize("numbers", "SELECT * FROM range(5)")
            .unwrap();
        assert!(relation.name().starts_with("numbers_"));
        assert_eq!(relation.rows(), 5);

        let name = relation.sql_name();
        assert_eq!(session.count(&format!("SELECT * FROM {name}")).unwrap(), 5);

        session.release(relation).unwrap();
        assert!(session.count(&format!("SELECT * FROM {name}")).is_err());
    }

    #[test]
    fn test_materialized_names_are_unique() {
        let session = Session::open(&local_config()).unwrap();
        let a = session.materialize("dup", "SELECT 1 AS x").unwrap();
        let b = session.materialize("dup", "SELECT 1 AS x").unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_relations_are_private_to_their_session() {
        let first = Session::get_or_create(&local_config()).unwrap();
        let second = Session::get_or_create(&local_config()).unwrap();
        assert!(first.is_shared());
        assert!(second.is_shared());

        let relation = first.materialize("private", "SELECT 42 AS answer").unwrap();
        let name = relation.sql_name();
        assert_eq!(first.count(&format!("SELECT * FROM {name}")).unwrap(), 1);
        assert!(second.count(&format!("SELECT * FROM {name}")).is_err());
    }

    #[test]
    fn test_named_timezone_is_loaded() {
        let config = local_config()
            .with_timezone(TimeZoneSetting::Named("America/New_York".to_string()));
        let session = Session::open(&config).unwrap();
        assert_eq!(
            session
                .count("SELECT timezone('America/New_York', TIMESTAMPTZ '2001-09-09 01:46:40+00')")
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_unknown_timezone_is_config_error() {
        let config =
            local_config().with_timezone(TimeZoneSetting::Named("Foo/Bar".to_string()));
        let err = Session::open(&config).err().unwrap();
        assert!(
            matches!(err, Error::InvalidConfigValue { ref field, .. } if field == KEY_TIMEZONE),
            "{err}"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_shared_session_checks_timezone_on_every_call() {
        Session::get_or_create(&local_config()).unwrap();
        let config =
            local_config().with_timezone(TimeZoneSetting::Named("Foo/Bar".to_string()));
        let err = Session::get_or_create(&config).err().unwrap();
        assert!(matches!(err, Error::InvalidConfigValue { .. }), "{err}");
    }

    #[test]
    fn test_query_error_carries_action() {
        let session = Session::open(&local_config()).unwrap();
        let err = session
            .execute("reading nothing", "SELECT * FROM no_such_table")
            .unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert!(err.to_string().contains("reading nothing"));
    }
}
