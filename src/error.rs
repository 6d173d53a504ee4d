//! Error types for the Sparkify ETL pipeline
//!
//! This module defines the error hierarchy for the whole pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Nothing is recovered locally: every error travels up to `main`.

use thiserror::Error;

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to read config file '{path}': {message}")]
    ConfigFile { path: String, message: String },

    // ============================================================================
    // Engine Errors
    // ============================================================================
    #[error("Engine error: {0}")]
    Engine(#[from] duckdb::Error),

    #[error("Query failed while {action}: {source}")]
    Query {
        action: String,
        #[source]
        source: duckdb::Error,
    },

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Write target already exists: {path} (set WRITE_MODE=overwrite to replace it)")]
    TargetExists { path: String },

    // ============================================================================
    // Output Inspection Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap an engine error with what the pipeline was doing at the time
    pub fn query(action: impl Into<String>, source: duckdb::Error) -> Self {
        Self::Query {
            action: action.into(),
            source,
        }
    }

    /// Create a target-exists error
    pub fn target_exists(path: impl Into<String>) -> Self {
        Self::TargetExists { path: path.into() }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether the pipeline failed before it started touching data
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::ConfigFile { .. }
                | Error::InvalidUrl(_)
        )
    }
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("S3_OUTPUT_PATH");
        assert_eq!(
            err.to_string(),
            "Missing required config field: S3_OUTPUT_PATH"
        );

        let err = Error::target_exists("/tmp/out/songs");
        assert!(err.to_string().contains("/tmp/out/songs"));
        assert!(err.to_string().contains("WRITE_MODE=overwrite"));
    }

    #[test]
    fn test_is_config() {
        assert!(Error::config("bad").is_config());
        assert!(Error::missing_field("AWS_ACCESS_KEY_ID").is_config());
        assert!(Error::invalid_value("WRITE_MODE", "nope").is_config());

        assert!(!Error::target_exists("x").is_config());
        assert!(!Error::output("x").is_config());
        assert!(!Error::Other("x".to_string()).is_config());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
