//! Error types for pgmap

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgmap operations
pub type MapResult<T> = Result<T, MapError>;

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum MapError {
    /// A template interpolation marker's dotted path could not be resolved
    #[error("Missing content for \"{path}\".")]
    Interpolation { path: String },

    /// No loader registered for a value's runtime kind or any of its supertypes
    #[error("No loader for {kind}")]
    NoLoader { kind: &'static str },

    /// A loader found its input shape but the value itself could not be coerced
    #[error("Cannot load {target} value: {message}")]
    Coerce {
        target: &'static str,
        message: String,
    },

    /// Affected/returned row count did not match the structurally expected count
    #[error("{got} results returned, but {expected} expected")]
    ResultMismatch { expected: u64, got: u64 },

    /// An attribute name not present on the record type
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A table or column name failed identifier validation
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Builder/usage validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row cell decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Pool acquire timeout
    #[error("Acquire timeout after {0:?}")]
    Timeout(Duration),
}

impl MapError {
    /// Create an interpolation error for a dotted marker path
    pub fn interpolation(path: impl Into<String>) -> Self {
        Self::Interpolation { path: path.into() }
    }

    /// Create a coercion error for a target attribute type
    pub fn coerce(target: &'static str, message: impl Into<String>) -> Self {
        Self::Coerce {
            target,
            message: message.into(),
        }
    }

    /// Create a result-count mismatch error
    pub fn mismatch(expected: u64, got: u64) -> Self {
        Self::ResultMismatch { expected, got }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a result-count mismatch
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::ResultMismatch { .. })
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a pool acquire timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific MapError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<deadpool_postgres::PoolError> for MapError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
