//! Error types for the SQL Server dialect layer
//!
//! Compilation errors are surfaced synchronously to the caller; a malformed
//! plan is a caller bug and is never recovered from locally.

use thiserror::Error;

/// Result type alias for dialect operations
pub type DialectResult<T> = Result<T, DialectError>;

/// Error types for SQL Server dialect compilation and execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DialectError {
    /// A value has no literal form in the dialect and no handler covers it
    #[error("Unsupported literal kind: {kind}")]
    UnsupportedLiteralKind { kind: String },

    /// Identity columns are assigned by the engine and cannot be updated
    #[error("Identity column '{column}' of table '{table}' cannot be updated")]
    IdentityColumnImmutable { table: String, column: String },

    /// The requested isolation level has no mapping in the dialect rules
    #[error("Unsupported isolation level: {level}")]
    UnsupportedIsolationLevel { level: String },

    /// Rollback target was never created in the current frame stack
    #[error("Unknown savepoint: {name}")]
    UnknownSavepoint { name: String },

    /// A type discriminator names no registered variant
    #[error("Invalid single-table inheritance type: '{value}' is not a registered subclass of {base}")]
    SubclassNotFound { base: String, value: String },

    /// The query plan violates a structural invariant
    #[error("Invalid query plan: {0}")]
    InvalidPlan(String),

    /// Identifier is empty or too long for the dialect
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The dialect cannot express the requested operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Transaction state machine error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Error reported by the driver collaborator
    #[error("Driver error: {0}")]
    Driver(String),

    /// Dialect rules could not be loaded or are inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DialectError {
    pub(crate) fn unsupported_literal(kind: impl std::fmt::Display) -> Self {
        DialectError::UnsupportedLiteralKind {
            kind: kind.to_string(),
        }
    }
}

impl From<serde_json::Error> for DialectError {
    fn from(err: serde_json::Error) -> Self {
        DialectError::Configuration(err.to_string())
    }
}

impl From<crate::config::ConfigError> for DialectError {
    fn from(err: crate::config::ConfigError) -> Self {
        DialectError::Configuration(err.to_string())
    }
}
