//! Error types for source operations.

use std::fmt::Display;

/// Errors raised while listing or fetching objects from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be enumerated (transport or auth failure).
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// A single object could not be fetched.
    #[error("failed to fetch '{key}': {message}")]
    FetchFailed { key: String, message: String },

    /// No release carries the tag named by the key.
    #[error("release not found for tag '{tag}'")]
    ReleaseNotFound { tag: String },

    /// The release exists but has no asset with the name named by the key.
    #[error("asset '{asset}' not found in release '{tag}'")]
    AssetNotFound { tag: String, asset: String },

    /// The key does not belong to this source's namespace.
    #[error("invalid object key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub(crate) fn fetch_failed(key: &str, message: impl Display) -> Self {
        SourceError::FetchFailed {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
