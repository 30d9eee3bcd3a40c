//! Source creation from configuration.

use std::sync::Arc;

use thiserror::Error;

use super::{
    ObjectStoreSource, ObjectStoreSourceConfig, ReleaseAssetSource, ReleaseAssetSourceConfig,
    Source,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that prevent a source from being constructed.
#[derive(Debug, Error)]
pub enum CreateSourceError {
    /// One or more required settings are empty or absent.
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    /// A release repository was not of the form `owner/name`.
    #[error("invalid repository '{0}': expected owner/name")]
    InvalidRepositorySpec(String),

    /// The underlying client could not be built.
    #[error("failed to create client: {0}")]
    Client(String),
}

/// Result type for source creation.
pub type CreateSourceResult<T> = std::result::Result<T, CreateSourceError>;

// =============================================================================
// Source Configuration
// =============================================================================

/// The kind of source named by a mirror's `source` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// An S3 bucket (`source = s3`).
    ObjectStore,
    /// GitHub release assets (`source = github`).
    ReleaseAssets,
}

impl SourceType {
    /// Look up a source type by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "s3" => Some(SourceType::ObjectStore),
            "github" => Some(SourceType::ReleaseAssets),
            _ => None,
        }
    }

    /// The configuration name of this source type.
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::ObjectStore => "s3",
            SourceType::ReleaseAssets => "github",
        }
    }
}

/// Connection parameters for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    ObjectStore(ObjectStoreSourceConfig),
    ReleaseAssets(ReleaseAssetSourceConfig),
}

impl SourceConfig {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceConfig::ObjectStore(_) => SourceType::ObjectStore,
            SourceConfig::ReleaseAssets(_) => SourceType::ReleaseAssets,
        }
    }

    /// Human-readable location of the source, without credentials.
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::ObjectStore(config) => config.describe(),
            SourceConfig::ReleaseAssets(config) => config.describe(),
        }
    }
}

/// Construct the source described by `config`.
///
/// Configuration is validated before any client is built, so a bad
/// definition fails here without touching the network.
pub async fn create_source(config: &SourceConfig) -> CreateSourceResult<Arc<dyn Source>> {
    match config {
        SourceConfig::ObjectStore(config) => {
            Ok(Arc::new(ObjectStoreSource::new(config.clone()).await?))
        }
        SourceConfig::ReleaseAssets(config) => {
            Ok(Arc::new(ReleaseAssetSource::new(config.clone())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_names() {
        assert_eq!(SourceType::from_name("s3"), Some(SourceType::ObjectStore));
        assert_eq!(SourceType::from_name(" GitHub "), Some(SourceType::ReleaseAssets));
        assert_eq!(SourceType::from_name("ftp"), None);
        assert_eq!(SourceType::ObjectStore.name(), "s3");
        assert_eq!(SourceType::ReleaseAssets.name(), "github");
    }

    #[test]
    fn test_missing_configuration_message() {
        let err = CreateSourceError::MissingConfiguration(vec!["access_key", "secret_key"]);
        assert_eq!(
            err.to_string(),
            "missing required configuration: access_key, secret_key"
        );
    }

    #[tokio::test]
    async fn test_create_source_rejects_incomplete_object_store() {
        let config = SourceConfig::ObjectStore(ObjectStoreSourceConfig {
            bucket: "bucket".to_string(),
            ..Default::default()
        });

        let err = create_source(&config).await.err().unwrap();
        assert!(matches!(
            err,
            CreateSourceError::MissingConfiguration(ref fields)
                if fields == &vec!["prefix", "region", "access_key", "secret_key"]
        ));
    }

    #[tokio::test]
    async fn test_create_source_release_assets() {
        let config = SourceConfig::ReleaseAssets(ReleaseAssetSourceConfig::new("acme/widget"));
        let source = create_source(&config).await.unwrap();
        assert_eq!(source.describe(), "github:acme/widget");
    }
}
