//! Destination artifact repositories.
//!
//! A [`Destination`] answers whether an object already exists at a path of a
//! repository and stores local files at such paths. Variants:
//! - [`ArtifactoryDestination`] - an Artifactory-compatible REST gateway
//! - [`MemoryDestination`] - in-memory objects, for tests

mod artifactory_destination;
mod error;
mod memory_destination;

pub use artifactory_destination::ArtifactoryDestination;
pub use error::{DestinationError, Result};
pub use memory_destination::{MemoryDestination, StoreRecord};

use async_trait::async_trait;
use std::path::Path;

/// The path an object occupies in the destination: `repository/relative_path`.
///
/// Existence checks and uploads for the same key always go through this
/// function, so an object stored by one iteration is found by the next.
pub fn target_path(repository: &str, relative_path: &str) -> String {
    format!("{}/{}", repository, relative_path)
}

/// An artifact repository that mirrored objects are uploaded to.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Check whether a file exists at exactly `repository/relative_path`.
    async fn exists(&self, repository: &str, relative_path: &str) -> Result<bool>;

    /// Upload `local_file` to `repository/relative_path`.
    ///
    /// Returns `DestinationError::UploadFailed` if the upload was not accepted.
    async fn store(&self, local_file: &Path, repository: &str, relative_path: &str)
    -> Result<()>;
}
