//! Core error types for pointbank-core.
//!
//! Local failures (`PersistenceError`, `ValidationError`) are returned to the
//! caller of a write. `RemoteError` only ever surfaces inside the sync
//! manager, which logs it and keeps the intent queued.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::TimeKind;

/// Core error type for pointbank-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Local storage errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Domain-rule violations detected before commit
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remote service errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local storage errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The storage medium cannot be reached (or is full).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored entry could not be decoded
    #[error("Corrupt entry '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage
    #[error("Failed to encode entry '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Domain-rule violations. A write that fails validation creates no record
/// and no queue entry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Practice accuracy {correct}/{total} is below the 80% threshold")]
    AccuracyBelowThreshold { correct: u32, total: u32 },

    #[error("Practice total must be greater than zero")]
    EmptyPractice,

    #[error("Rank {old_rank} -> {new_rank} is not an improvement")]
    NoImprovement { old_rank: u32, new_rank: u32 },

    #[error("Requested {requested} min of {kind} time but only {remaining} min remain")]
    InsufficientTime {
        kind: TimeKind,
        requested: u32,
        remaining: u32,
    },

    #[error("Point value for '{kind}' computed to zero")]
    ZeroPoints { kind: String },

    #[error("Time usage must be at least one minute")]
    ZeroMinutes,

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Remote adapter failures. Never propagated to the caller of a write.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote call '{operation}' timed out after {limit:?}")]
    Timeout {
        operation: String,
        limit: std::time::Duration,
    },

    #[error("Failed to decode remote payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid remote URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Remote rejected request: {0}")]
    Rejected(String),

    #[error("Remote service not configured")]
    NotConfigured,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Could not determine data directory: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => match inner.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    PersistenceError::Locked
                }
                rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::ReadOnly => PersistenceError::Unavailable(err.to_string()),
                _ => PersistenceError::QueryFailed(err.to_string()),
            },
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::EmptyPractice.into();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyPractice)));
    }

    #[test]
    fn insufficient_time_message_names_kind() {
        let err = ValidationError::InsufficientTime {
            kind: TimeKind::Game,
            requested: 30,
            remaining: 10,
        };
        assert_eq!(
            err.to_string(),
            "Requested 30 min of game time but only 10 min remain"
        );
    }
}
