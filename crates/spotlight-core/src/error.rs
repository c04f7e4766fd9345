//! Error types for Spotlight Core

use thiserror::Error;

use crate::limits::ValidationError;

/// Result type alias using Spotlight's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Spotlight core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid observer id: {0}")]
    InvalidObserverId(String),

    #[error("Unknown notification name: {0}")]
    UnknownNotification(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}
