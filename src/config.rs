//! Pipeline configuration
//!
//! The configuration file is a `KEY=VALUE` file (dotenv syntax, `#`
//! comments, optional quoting). INI files with one leading `[section]`
//! header and `KEY: VALUE` lines are read too. It is parsed into a [`PipelineConfig`] that
//! is built once and handed to every component explicitly. Parsing never
//! touches the process environment: credentials are injected into the
//! engine session and the object store client directly.
//!
//! ```text
//! AWS_ACCESS_KEY_ID=AKIA...
//! AWS_SECRET_ACCESS_KEY='...'
//! S3_OUTPUT_PATH=s3://my-bucket/sparkify/
//! ```
//!
//! Values are subject to dotenv `${VAR}` substitution; single-quote secrets
//! that contain a `$`.

use crate::error::{Error, Result};
use crate::output::{check_location, is_remote};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// Keys and defaults
// ============================================================================

/// Config file read when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "environment.cfg";

/// Root of the song catalog files
pub const DEFAULT_SONG_INPUT: &str = "s3://udacity-dend/song-data/";

/// Root of the listening-session log files
pub const DEFAULT_LOG_INPUT: &str = "s3://udacity-dend/log-data/";

/// Region used when the config file does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

pub const KEY_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const KEY_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const KEY_REGION: &str = "AWS_DEFAULT_REGION";
pub const KEY_ENDPOINT: &str = "AWS_ENDPOINT";
pub const KEY_OUTPUT_PATH: &str = "S3_OUTPUT_PATH";
pub const KEY_SONG_INPUT: &str = "SONG_DATA_PATH";
pub const KEY_LOG_INPUT: &str = "LOG_DATA_PATH";
pub const KEY_WRITE_MODE: &str = "WRITE_MODE";
pub const KEY_TIMEZONE: &str = "TIMEZONE";
pub const KEY_COMPRESSION: &str = "PARQUET_COMPRESSION";

// ============================================================================
// Storage credentials
// ============================================================================

/// Object store credentials, injected into the engine and the storage client
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket region
    pub region: String,
    /// Custom endpoint for S3-compatible stores (R2, MinIO, ...)
    pub endpoint: Option<String>,
}

impl StorageCredentials {
    /// Create credentials for the default region
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
        }
    }

    /// Access key id with all but the first four characters hidden
    pub fn masked_key_id(&self) -> String {
        mask(&self.access_key_id)
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.masked_key_id())
            .field("secret_access_key", &"****")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}

// ============================================================================
// Write mode
// ============================================================================

/// What to do when an output table location already holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fail the run before writing anything to that table
    #[default]
    ErrorIfExists,
    /// Delete the existing table contents, then write
    Overwrite,
}

impl FromStr for WriteMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error_if_exists" | "error" | "errorifexists" => Ok(WriteMode::ErrorIfExists),
            "overwrite" => Ok(WriteMode::Overwrite),
            other => Err(Error::invalid_value(
                KEY_WRITE_MODE,
                format!("expected 'error_if_exists' or 'overwrite', got '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Time zone
// ============================================================================

/// Time zone used to derive calendar fields from play timestamps
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimeZoneSetting {
    /// Epoch milliseconds are read as UTC wall-clock time
    #[default]
    Utc,
    /// An IANA zone name such as `America/Los_Angeles`
    Named(String),
}

impl TimeZoneSetting {
    /// Display name of the zone
    pub fn name(&self) -> &str {
        match self {
            TimeZoneSetting::Utc => "UTC",
            TimeZoneSetting::Named(name) => name,
        }
    }
}

impl FromStr for TimeZoneSetting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty()
            || s.eq_ignore_ascii_case("utc")
            || s.eq_ignore_ascii_case("etc/utc")
            || s.eq_ignore_ascii_case("z")
        {
            return Ok(TimeZoneSetting::Utc);
        }
        if s.eq_ignore_ascii_case("local") {
            return Err(Error::invalid_value(
                KEY_TIMEZONE,
                "'local' depends on the host; name the zone explicitly (e.g. 'Europe/Berlin')",
            ));
        }
        let valid = s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'));
        if !valid {
            return Err(Error::invalid_value(
                KEY_TIMEZONE,
                format!("'{s}' is not a time zone name"),
            ));
        }
        Ok(TimeZoneSetting::Named(s.to_string()))
    }
}

// ============================================================================
// Parquet compression
// ============================================================================

/// Compression codec for the written Parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParquetCompression {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    Uncompressed,
}

impl ParquetCompression {
    /// Codec name as the engine's `COPY` statement spells it
    pub fn sql_name(self) -> &'static str {
        match self {
            ParquetCompression::Snappy => "SNAPPY",
            ParquetCompression::Zstd => "ZSTD",
            ParquetCompression::Gzip => "GZIP",
            ParquetCompression::Uncompressed => "UNCOMPRESSED",
        }
    }
}

impl FromStr for ParquetCompression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snappy" => Ok(ParquetCompression::Snappy),
            "zstd" => Ok(ParquetCompression::Zstd),
            "gzip" => Ok(ParquetCompression::Gzip),
            "none" | "uncompressed" => Ok(ParquetCompression::Uncompressed),
            other => Err(Error::invalid_value(
                KEY_COMPRESSION,
                format!("unsupported codec '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Pipeline config
// ============================================================================

/// Everything a run needs, resolved once at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Object store credentials (required when any location is remote)
    pub credentials: Option<StorageCredentials>,
    /// Root under which all tables are written
    pub output_root: String,
    /// Root of the song catalog files
    pub song_input: String,
    /// Root of the event log files
    pub log_input: String,
    /// Behaviour when a table location already holds data
    pub write_mode: WriteMode,
    /// Zone for calendar fields of the time dimension
    pub timezone: TimeZoneSetting,
    /// Parquet codec
    pub compression: ParquetCompression,
}

impl PipelineConfig {
    /// Config with local/explicit locations and defaults everywhere else
    pub fn new(
        song_input: impl Into<String>,
        log_input: impl Into<String>,
        output_root: impl Into<String>,
    ) -> Self {
        Self {
            credentials: None,
            output_root: output_root.into(),
            song_input: song_input.into(),
            log_input: log_input.into(),
            write_mode: WriteMode::default(),
            timezone: TimeZoneSetting::default(),
            compression: ParquetCompression::default(),
        }
    }

    /// Set the write mode
    #[must_use]
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Set the time zone
    #[must_use]
    pub fn with_timezone(mut self, timezone: TimeZoneSetting) -> Self {
        self.timezone = timezone;
        self
    }

    /// Set storage credentials
    #[must_use]
    pub fn with_credentials(mut self, credentials: StorageCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_error = |message: String| Error::ConfigFile {
            path: path.display().to_string(),
            message,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let pairs = read_pairs(&contents).map_err(file_error)?;

        tracing::debug!(path = %path.display(), keys = pairs.len(), "Loaded config file");
        Self::from_pairs(&pairs)
    }

    /// Parse config file contents held in memory
    pub fn parse(contents: &str) -> Result<Self> {
        let pairs = read_pairs(contents).map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        Self::from_pairs(&pairs)
    }

    /// Build and validate a config from key/value pairs
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            pairs
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let output_root = get(KEY_OUTPUT_PATH).ok_or_else(|| Error::missing_field(KEY_OUTPUT_PATH))?;
        let song_input = get(KEY_SONG_INPUT).unwrap_or_else(|| DEFAULT_SONG_INPUT.to_string());
        let log_input = get(KEY_LOG_INPUT).unwrap_or_else(|| DEFAULT_LOG_INPUT.to_string());

        let credentials = match (get(KEY_ACCESS_KEY_ID), get(KEY_SECRET_ACCESS_KEY)) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StorageCredentials {
                access_key_id,
                secret_access_key,
                region: get(KEY_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint: get(KEY_ENDPOINT),
            }),
            (Some(_), None) => return Err(Error::missing_field(KEY_SECRET_ACCESS_KEY)),
            (None, Some(_)) => return Err(Error::missing_field(KEY_ACCESS_KEY_ID)),
            (None, None) => None,
        };

        let write_mode = get(KEY_WRITE_MODE)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let timezone = get(KEY_TIMEZONE)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let compression = get(KEY_COMPRESSION)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            credentials,
            output_root,
            song_input,
            log_input,
            write_mode,
            timezone,
            compression,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements
    pub fn validate(&self) -> Result<()> {
        if self.output_root.trim().is_empty() {
            return Err(Error::missing_field(KEY_OUTPUT_PATH));
        }
        check_location(KEY_OUTPUT_PATH, &self.output_root)?;
        check_location(KEY_SONG_INPUT, &self.song_input)?;
        check_location(KEY_LOG_INPUT, &self.log_input)?;
        if self.requires_remote_storage() && self.credentials.is_none() {
            return Err(Error::missing_field(KEY_ACCESS_KEY_ID));
        }
        Ok(())
    }

    /// Whether any input or output location lives in an object store
    pub fn requires_remote_storage(&self) -> bool {
        [&self.output_root, &self.song_input, &self.log_input]
            .iter()
            .any(|loc| is_remote(loc))
    }

    /// Printable summary with secrets masked
    pub fn summary(&self) -> Value {
        json!({
            "output_root": self.output_root,
            "song_input": self.song_input,
            "log_input": self.log_input,
            "write_mode": self.write_mode,
            "timezone": self.timezone.name(),
            "compression": self.compression,
            "credentials": self.credentials.as_ref().map(|c| json!({
                "access_key_id": c.masked_key_id(),
                "region": c.region,
                "endpoint": c.endpoint,
            })),
        })
    }
}

// ============================================================================
// File syntax
// ============================================================================

/// Key/value pairs of a config file
///
/// Accepts plain dotenv files as well as INI files with one leading
/// `[section]` header and `KEY: VALUE` lines. Keys are upper-cased.
fn read_pairs(contents: &str) -> std::result::Result<HashMap<String, String>, String> {
    let mut pairs = HashMap::new();
    for item in dotenvy::from_read_iter(to_dotenv(contents)?.as_bytes()) {
        let (key, value) = item.map_err(|e| e.to_string())?;
        pairs.insert(key, value);
    }
    Ok(pairs)
}

/// Rewrite INI syntax into dotenv syntax
fn to_dotenv(contents: &str) -> std::result::Result<String, String> {
    let mut section: Option<&str> = None;
    let mut seen_key = false;
    let mut lines = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if let Some(previous) = section {
                return Err(format!(
                    "line {}: section [{name}] follows [{previous}]; only one section is supported",
                    index + 1
                ));
            }
            if seen_key {
                return Err(format!(
                    "line {}: section [{name}] must come before any key",
                    index + 1
                ));
            }
            section = Some(name);
            continue;
        }

        seen_key = true;
        let line = line.strip_prefix("export ").map_or(line, str::trim_start);
        match line.find(['=', ':']) {
            Some(pos) => lines.push(format!(
                "{}={}",
                line[..pos].trim().to_ascii_uppercase(),
                line[pos + 1..].trim()
            )),
            // Left for the dotenv parser to report
            None => lines.push(line.to_string()),
        }
    }
    Ok(lines.join("\n"))
}
