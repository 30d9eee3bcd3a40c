//! GitHub release-asset Source implementation.
//!
//! The release API addresses assets by numeric ids, not by (tag, name), so
//! this source synthesizes a compound [`ReleaseKey`] of the form
//! `owner/repo/tag/asset` for every asset of every release. Fetching a key
//! re-resolves the tag and asset name to ids; a release or asset deleted
//! between listing and fetching surfaces as `ReleaseNotFound` or
//! `AssetNotFound`.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::create_source::{CreateSourceError, CreateSourceResult};
use super::staged_file::StagedFile;
use super::{ObjectKey, Result, Source, SourceError};

/// Default base URL of the GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Items requested per page when listing releases and assets.
const PAGE_SIZE: usize = 100;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const BINARY_MEDIA_TYPE: &str = "application/octet-stream";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("mirrorsync/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for ReleaseAssetSource.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ReleaseAssetSourceConfig {
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Optional access token. Unauthenticated calls are subject to tighter
    /// rate limits.
    pub token: Option<String>,
    /// Optional API base URL (GitHub Enterprise, tests).
    pub api_url: Option<String>,
}

impl ReleaseAssetSourceConfig {
    /// Create a new config for the given `owner/name` repository.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            token: None,
            api_url: None,
        }
    }

    /// Set an access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Split the repository into `(owner, name)`.
    pub fn owner_and_name(&self) -> CreateSourceResult<(String, String)> {
        let spec = self.repository.trim();
        if spec.is_empty() {
            return Err(CreateSourceError::MissingConfiguration(vec!["repo"]));
        }

        let segments: Vec<&str> = spec.split('/').collect();
        match segments.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                Ok((owner.to_string(), name.to_string()))
            }
            _ => Err(CreateSourceError::InvalidRepositorySpec(spec.to_string())),
        }
    }

    /// The `github:owner/name` location mirrored by this config.
    pub fn describe(&self) -> String {
        format!("github:{}", self.repository.trim())
    }
}

impl fmt::Debug for ReleaseAssetSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseAssetSourceConfig")
            .field("repository", &self.repository)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .finish()
    }
}

// =============================================================================
// Compound Keys
// =============================================================================

/// The `owner/repo/tag/asset` key of one release asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseKey {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub asset: String,
}

impl ReleaseKey {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        tag: impl Into<String>,
        asset: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            tag: tag.into(),
            asset: asset.into(),
        }
    }

    /// Recover the tag and asset name from a key of the `owner/repo` repository.
    ///
    /// The asset name is the last segment and the tag is everything between
    /// the `owner/repo/` prefix and the asset, so tags containing `/` are
    /// recovered intact.
    pub fn parse(key: &str, owner: &str, repo: &str) -> Result<Self> {
        let invalid = |message: &str| SourceError::InvalidKey {
            key: key.to_string(),
            message: message.to_string(),
        };

        let rest = key
            .strip_prefix(owner)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_prefix(repo))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| invalid(&format!("not a key of {}/{}", owner, repo)))?;

        let (tag, asset) = rest
            .rsplit_once('/')
            .ok_or_else(|| invalid("expected owner/repo/tag/asset"))?;

        if tag.is_empty() || asset.is_empty() {
            return Err(invalid("empty tag or asset name"));
        }

        Ok(Self::new(owner, repo, tag, asset))
    }

    pub fn to_object_key(&self) -> ObjectKey {
        self.to_string()
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.owner, self.repo, self.tag, self.asset)
    }
}

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct Release {
    id: u64,
    tag_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Asset {
    id: u64,
    name: String,
}

// =============================================================================
// ReleaseAssetSource
// =============================================================================

/// A Source exposing the assets of a GitHub repository's releases.
pub struct ReleaseAssetSource {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl ReleaseAssetSource {
    /// Create a new ReleaseAssetSource with the given configuration.
    pub fn new(config: ReleaseAssetSourceConfig) -> CreateSourceResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CreateSourceError::Client(e.to_string()))?;
        Self::with_client(client, config)
    }

    /// Create a new ReleaseAssetSource with a custom reqwest client.
    pub fn with_client(client: Client, config: ReleaseAssetSourceConfig) -> CreateSourceResult<Self> {
        let (owner, repo) = config.owner_and_name()?;
        let api_url = config
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            api_url,
            owner,
            repo,
            token: config.token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_url, self.owner, self.repo)
    }

    fn assets_url(&self, release_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/releases/{}/assets",
            self.api_url, self.owner, self.repo, release_id
        )
    }

    fn asset_download_url(&self, asset_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_url, self.owner, self.repo, asset_id
        )
    }

    fn request(&self, url: &str, accept: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .header(API_VERSION_HEADER, API_VERSION);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Fetch every page of a JSON array endpoint.
    async fn get_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .request(url, JSON_MEDIA_TYPE)
                .query(&[
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .map_err(|e| SourceError::Unavailable(format!("GET {}: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Unavailable(format!(
                    "GET {} returned {}",
                    url, status
                )));
            }

            let batch: Vec<T> = response.json().await.map_err(|e| {
                SourceError::Unavailable(format!("failed to parse response from {}: {}", url, e))
            })?;

            let last_page = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    async fn list_releases(&self) -> Result<Vec<Release>> {
        self.get_all_pages(&self.releases_url()).await
    }

    async fn list_assets(&self, release_id: u64) -> Result<Vec<Asset>> {
        self.get_all_pages(&self.assets_url(release_id)).await
    }

    /// Resolve a key's tag and asset name to the asset to download.
    async fn resolve_asset(&self, key: &str, release_key: &ReleaseKey) -> Result<Asset> {
        let release = self
            .list_releases()
            .await
            .map_err(|e| SourceError::fetch_failed(key, e))?
            .into_iter()
            .find(|release| release.tag_name == release_key.tag)
            .ok_or_else(|| SourceError::ReleaseNotFound {
                tag: release_key.tag.clone(),
            })?;

        self.list_assets(release.id)
            .await
            .map_err(|e| SourceError::fetch_failed(key, e))?
            .into_iter()
            .find(|asset| asset.name == release_key.asset)
            .ok_or_else(|| SourceError::AssetNotFound {
                tag: release_key.tag.clone(),
                asset: release_key.asset.clone(),
            })
    }

    async fn copy_response(key: &str, mut response: Response, staged: &mut StagedFile) -> Result<()> {
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::fetch_failed(key, e))?
        {
            staged.write(&chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Source for ReleaseAssetSource {
    async fn list_objects(&self) -> Result<Vec<ObjectKey>> {
        let mut keys = Vec::new();

        for release in self.list_releases().await? {
            for asset in self.list_assets(release.id).await? {
                let key = ReleaseKey::new(&self.owner, &self.repo, &release.tag_name, asset.name);
                keys.push(key.to_object_key());
            }
        }

        Ok(keys)
    }

    async fn fetch_object(&self, key: &str, destination: &Path) -> Result<()> {
        let release_key = ReleaseKey::parse(key, &self.owner, &self.repo)?;
        let asset = self.resolve_asset(key, &release_key).await?;

        let response = self
            .request(&self.asset_download_url(asset.id), BINARY_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| SourceError::fetch_failed(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::fetch_failed(
                key,
                format!("asset download returned {}", status),
            ));
        }

        let mut staged = StagedFile::create(destination).await?;
        match Self::copy_response(key, response, &mut staged).await {
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
        format!("github:{}/{}", self.owner, self.repo)
    }
}
