//! Query error types

use thiserror::Error;

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Query-specific error types
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("No predicate set before start")]
    MissingPredicate,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Substrate error: {0}")]
    Substrate(String),

    #[error("Result index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Attribute {attribute} unavailable at index {index}: {reason}")]
    AttributeFetch {
        index: usize,
        attribute: String,
        reason: String,
    },

    #[error("Poll loop requires a running tokio runtime")]
    NoRuntime,

    #[error("Query has been closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    Config(#[from] spotlight_core::limits::ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
