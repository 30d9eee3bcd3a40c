//! S3-based Source implementation.
//!
//! ObjectStoreSource mirrors every object under a prefix of an S3 bucket.
//! Object keys are passed through verbatim as [`ObjectKey`]s.

use super::create_source::{CreateSourceError, CreateSourceResult};
use super::staged_file::StagedFile;
use super::{ObjectKey, Result, Source, SourceError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::fmt;
use std::path::Path;

/// Provider name attached to the static credentials built from configuration.
const CREDENTIALS_PROVIDER: &str = "mirrorsync-config";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for ObjectStoreSource.
///
/// Every field except `endpoint_url` is required.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ObjectStoreSourceConfig {
    /// S3 bucket name.
    pub bucket: String,
    /// Key prefix to mirror.
    pub prefix: String,
    /// AWS region of the bucket.
    pub region: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Optional custom endpoint URL (for MinIO, LocalStack, etc.).
    pub endpoint_url: Option<String>,
}

impl ObjectStoreSourceConfig {
    /// Create a new config for the given bucket, prefix and region.
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    /// Set the static credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Set a custom endpoint URL (for MinIO, LocalStack, etc.).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Names of the required settings that are empty, in configuration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("bucket", &self.bucket),
            ("prefix", &self.prefix),
            ("region", &self.region),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Check that every required setting is present.
    ///
    /// All absent settings are reported in a single error.
    pub fn validate(&self) -> CreateSourceResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CreateSourceError::MissingConfiguration(missing))
        }
    }

    /// The `s3://bucket/prefix` location mirrored by this config.
    pub fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

impl fmt::Debug for ObjectStoreSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreSourceConfig")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

// =============================================================================
// ObjectStoreSource
// =============================================================================

/// A Source backed by an S3 bucket.
pub struct ObjectStoreSource {
    client: Client,
    config: ObjectStoreSourceConfig,
}

impl ObjectStoreSource {
    /// Create a new ObjectStoreSource with the given configuration.
    ///
    /// Fails with `MissingConfiguration` before building a client if any
    /// required setting is empty.
    pub async fn new(config: ObjectStoreSourceConfig) -> CreateSourceResult<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(ref endpoint) = config.endpoint_url {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self { client, config })
    }

    /// Write an object body into a staged file.
    async fn copy_body(key: &str, mut body: ByteStream, staged: &mut StagedFile) -> Result<()> {
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| SourceError::fetch_failed(key, DisplayErrorContext(&e)))?
        {
            staged.write(&chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Source for ObjectStoreSource {
    async fn list_objects(&self) -> Result<Vec<ObjectKey>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(&self.config.prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                SourceError::Unavailable(format!(
                    "listing {}: {}",
                    self.config.describe(),
                    DisplayErrorContext(&e)
                ))
            })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    // Directory markers carry no content
                    if key.ends_with('/') {
                        continue;
                    }
                    keys.push(key.to_string());
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn fetch_object(&self, key: &str, destination: &Path) -> Result<()> {
        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SourceError::fetch_failed(key, DisplayErrorContext(&e)))?;

        let mut staged = StagedFile::create(destination).await?;
        match Self::copy_body(key, response.body, &mut staged).await {
            Ok(()) => {
                staged.commit().await?;
                Ok(())
            }
            Err(e) => {
                staged.discard().await;
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        self.config.describe()
    }
}
