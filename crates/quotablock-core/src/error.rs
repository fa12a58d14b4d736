//! Core error types for quotablock-core.
//!
//! Configuration problems are caught when a rule set is loaded or edited and
//! reported as [`ConfigError`] / [`ValidationError`]. The pure engine
//! functions never fail on validated input; only collaborators (storage, tab
//! queries) produce runtime errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quotablock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Browser tab query errors
    #[error("Tab query error: {0}")]
    TabQuery(#[from] TabQueryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown rule set id
    #[error("Unknown rule set: {0}")]
    UnknownRuleSet(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(#[source] std::io::Error),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored value could not be decoded
    #[error("Corrupt value under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be encoded
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    /// The in-process lock guarding the store was poisoned
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Rule set failed validation
    #[error("Rule set '{rule_set}' is invalid: {source}")]
    InvalidRuleSet {
        rule_set: String,
        #[source]
        source: ValidationError,
    },
}

/// Validation errors for rule set fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Malformed time of day
    #[error("Invalid time of day '{0}': expected HH:mm:ss between 00:00:00 and 24:00:00")]
    InvalidDayTime(String),

    /// Malformed or unsupported ISO-8601 duration
    #[error("Invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    /// Zero or negative period
    #[error("Quota interval must be positive")]
    NonPositivePeriod,

    /// Window whose end precedes its start
    #[error("Daily window {start}-{end} spans midnight, which is not supported")]
    WindowSpansMidnight { start: String, end: String },

    /// Malformed URL match pattern
    #[error("Invalid match pattern '{0}'")]
    InvalidPattern(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by a browser tab collaborator.
#[derive(Error, Debug)]
pub enum TabQueryError {
    /// The query did not resolve in time
    #[error("Tab query timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The browser side reported a failure
    #[error("Tab query failed: {0}")]
    Failed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
