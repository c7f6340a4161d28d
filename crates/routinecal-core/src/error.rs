//! Core error types for routinecal-core.
//!
//! This module defines the error hierarchy used across the library. Each
//! category (storage, configuration, validation, calendar provider) has its
//! own enum, and [`CoreError`] wraps them all.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for routinecal-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed workout or event data, caught before any provider call
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Calendar provider errors
    #[error("Calendar provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A routine, mapping or event that the caller referenced does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A row with the same unique key already exists
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// Database is locked (or its guard was poisoned)
    #[error("Database is locked")]
    Locked,
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

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors raised by the event transformer and input parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required text field is empty
    #[error("Field '{field}' must not be empty")]
    EmptyField { field: String },

    /// A workout without exercises cannot be turned into an event
    #[error("Workout '{workout_id}' has no exercises")]
    NoExercises { workout_id: String },

    /// Exercise sets must be a positive integer
    #[error("Exercise '{exercise_id}' must have at least one set")]
    NonPositiveSets { exercise_id: String },

    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange { start: String, end: String },

    /// Unknown IANA time zone
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    /// Start time not in HH:MM form
    #[error("Invalid start time '{0}', expected HH:MM")]
    InvalidStartTime(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors returned by calendar providers.
///
/// Rate limits, server errors and transport failures are transient and may
/// be retried; authentication and malformed-request errors are not.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Rate limited by calendar provider")]
    RateLimited,

    #[error("Calendar provider server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Calendar provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether this error is transient and worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Server { .. } | ProviderError::Network(_)
        )
    }

    /// Whether the referenced event no longer exists on the provider.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    DatabaseError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());

        assert!(!ProviderError::Unauthorized("expired".into()).is_retryable());
        assert!(!ProviderError::Forbidden("denied".into()).is_retryable());
        assert!(!ProviderError::BadRequest("bad".into()).is_retryable());
        assert!(!ProviderError::NotFound("evt".into()).is_retryable());
    }

    #[test]
    fn not_found_classification() {
        assert!(ProviderError::NotFound("evt_1".into()).is_not_found());
        assert!(!ProviderError::RateLimited.is_not_found());
    }

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed".into()),
        );
        let db_err: DatabaseError = err.into();
        assert!(matches!(db_err, DatabaseError::Conflict(_)));
    }

    #[test]
    fn core_error_wraps_validation() {
        let err: CoreError = ValidationError::EmptyField {
            field: "summary".into(),
        }
        .into();
        assert!(err.to_string().contains("summary"));
    }
}
