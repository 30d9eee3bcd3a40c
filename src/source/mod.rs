//! Sources of objects to mirror.
//!
//! A [`Source`] enumerates the objects it holds as slash-delimited
//! [`ObjectKey`]s and downloads a single object to a local path. Variants:
//! - [`ObjectStoreSource`] - every key under a prefix of an S3 bucket
//! - [`ReleaseAssetSource`] - every asset of every release of a GitHub repository
//! - [`MemorySource`] - in-memory objects, for tests

mod create_source;
mod error;
mod memory_source;
mod object_store_source;
mod release_asset_source;
mod staged_file;

pub use create_source::{
    CreateSourceError, CreateSourceResult, SourceConfig, SourceType, create_source,
};
pub use error::{Result, SourceError};
pub use memory_source::MemorySource;
pub use object_store_source::{ObjectStoreSource, ObjectStoreSourceConfig};
pub use release_asset_source::{
    DEFAULT_API_URL, ReleaseAssetSource, ReleaseAssetSourceConfig, ReleaseKey,
};
pub use staged_file::partial_path;

use async_trait::async_trait;
use std::path::Path;

/// A slash-delimited string identifying one object within a source.
///
/// The same string is used, untransformed, as the object's path in the
/// destination repository.
pub type ObjectKey = String;

/// A backend that can enumerate and download objects.
#[async_trait]
pub trait Source: Send + Sync {
    /// List every object currently available.
    ///
    /// The listing is complete: paginated backends are followed to the last
    /// page before returning. Returns `SourceError::Unavailable` if the
    /// backend cannot be enumerated.
    async fn list_objects(&self) -> Result<Vec<ObjectKey>>;

    /// Download the object named by `key` to `destination`.
    ///
    /// Parent directories of `destination` are created as needed. The file
    /// only appears at `destination` once the download has completed.
    async fn fetch_object(&self, key: &str, destination: &Path) -> Result<()>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;
}
