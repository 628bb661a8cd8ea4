//! Error types for promptlog-core.

/// Errors that can occur in observability store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// SQLite database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input (empty rendered content, missing provider, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted status transition out of a terminal state
    #[error("invalid transition for execution {id}: record is already {from}")]
    InvalidTransition {
        /// Execution record ID
        id: String,
        /// Status the record was found in
        from: String,
    },

    /// General internal error
    #[error("{0}")]
    Internal(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
