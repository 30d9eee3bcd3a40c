//! Error types for destination operations.

use std::fmt::Display;

/// Errors raised by a destination repository.
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    /// The destination client could not be configured.
    #[error("invalid destination configuration: {0}")]
    InvalidConfiguration(String),

    /// An existence check could not be answered.
    #[error("failed to query '{path}': {message}")]
    QueryFailed { path: String, message: String },

    /// An upload was not accepted.
    #[error("failed to upload to '{path}': {message}")]
    UploadFailed { path: String, message: String },
}

impl DestinationError {
    pub(crate) fn query_failed(path: &str, message: impl Display) -> Self {
        DestinationError::QueryFailed {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn upload_failed(path: &str, message: impl Display) -> Self {
        DestinationError::UploadFailed {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for destination operations.
pub type Result<T> = std::result::Result<T, DestinationError>;
