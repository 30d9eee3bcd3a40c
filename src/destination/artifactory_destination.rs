use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::path::Path;

use super::error::{DestinationError, Result};
use super::{Destination, target_path};
use crate::config::ArtifactoryConfig;

/// Characters escaped within a single URL path segment.
///
/// Artifactory reads `;key=value` in a segment as matrix parameters, so `;`
/// must reach it escaped for the artifact path to match the key.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const API_KEY_HEADER: &str = "X-JFrog-Art-Api";

/// Response of the storage API. Folders list their children; files do not.
#[derive(Debug, Deserialize)]
struct StorageInfo {
    #[serde(default)]
    children: Option<Vec<serde_json::Value>>,
}

/// An Artifactory-compatible implementation of `Destination`.
///
/// Existence is answered by the storage API for the exact artifact path, and
/// uploads are a `PUT` of the file bytes to the artifact path.
pub struct ArtifactoryDestination {
    client: Client,
    base_url: String,
    username: Option<String>,
    api_key: Option<String>,
}

impl ArtifactoryDestination {
    /// Create a destination for the configured Artifactory instance.
    pub fn new(config: &ArtifactoryConfig) -> Result<Self> {
        Self::with_client(Client::new(), config)
    }

    /// Create a destination with a custom reqwest client.
    pub fn with_client(client: Client, config: &ArtifactoryConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DestinationError::InvalidConfiguration(
                "artifactory url is required".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url,
            username: config.username.clone().filter(|u| !u.is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/api/storage/{}", self.base_url, encode_path(path))
    }

    fn artifact_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(path))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.api_key) {
            (Some(username), key) => request.basic_auth(username, key.as_ref()),
            (None, Some(key)) => request.header(API_KEY_HEADER, key),
            (None, None) => request,
        }
    }
}

/// Percent-encode each segment of a slash-delimited path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Destination for ArtifactoryDestination {
    async fn exists(&self, repository: &str, relative_path: &str) -> Result<bool> {
        let path = target_path(repository, relative_path);

        let response = self
            .authorized(self.client.get(self.storage_url(&path)))
            .send()
            .await
            .map_err(|e| DestinationError::query_failed(&path, e))?;

        match response.status() {
            StatusCode::OK => {
                let info: StorageInfo = response.json().await.map_err(|e| {
                    DestinationError::query_failed(&path, format!("invalid storage info: {}", e))
                })?;
                // A folder at this path is not the object being mirrored
                Ok(info.children.is_none())
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(DestinationError::query_failed(
                &path,
                format!("unexpected status code: {}", status),
            )),
        }
    }

    async fn store(&self, local_file: &Path, repository: &str, relative_path: &str) -> Result<()> {
        let path = target_path(repository, relative_path);

        let cannot_read = |e: std::io::Error| {
            DestinationError::upload_failed(
                &path,
                format!("cannot read {}: {}", local_file.display(), e),
            )
        };
        let file = tokio::fs::File::open(local_file).await.map_err(cannot_read)?;
        let length = file.metadata().await.map_err(cannot_read)?.len();

        // Streamed from disk
        let response = self
            .authorized(self.client.put(self.artifact_url(&path)))
            .header(CONTENT_LENGTH, length)
            .body(Body::from(file))
            .send()
            .await
            .map_err(|e| DestinationError::upload_failed(&path, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DestinationError::upload_failed(
                &path,
                format!("unexpected status code: {}", response.status()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_bytes, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ArtifactoryConfig {
        ArtifactoryConfig {
            url: format!("{}/artifactory/", server.uri()),
            username: None,
            api_key: Some("api-key".to_string()),
        }
    }

    #[test]
    fn test_requires_url() {
        let result = ArtifactoryDestination::new(&ArtifactoryConfig::default());
        assert!(matches!(
            result,
            Err(DestinationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("repo/a b/c#1.txt"), "repo/a%20b/c%231.txt");
        assert_eq!(encode_path("repo/v1.0/widget.tar.gz"), "repo/v1.0/widget.tar.gz");
        assert_eq!(
            encode_path("repo/builds/app;v=2[x].zip"),
            "repo/builds/app%3Bv=2%5Bx%5D.zip"
        );
    }

    #[tokio::test]
    async fn test_semicolon_keys_keep_their_full_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/generic-local/builds/app%3Bv=2.zip"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/generic-local/builds/app%3Bv=2.zip"))
            .and(body_bytes(b"v2".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let local = temp.path().join("app.zip");
        std::fs::write(&local, b"v2").unwrap();

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        assert!(
            !destination
                .exists("generic-local", "builds/app;v=2.zip")
                .await
                .unwrap()
        );
        destination
            .store(&local, "generic-local", "builds/app;v=2.zip")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.url.path().contains("app%3Bv=2.zip")));
    }

    #[tokio::test]
    async fn test_exists_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/generic-local/a.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        assert!(!destination.exists("generic-local", "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/generic-local/a.txt"))
            .and(header(API_KEY_HEADER, "api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "repo": "generic-local",
                "path": "/a.txt",
                "size": "3"
            })))
            .mount(&server)
            .await;

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        assert!(destination.exists("generic-local", "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_folder_is_not_an_existing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/generic-local/nightly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "repo": "generic-local",
                "path": "/nightly",
                "children": [{ "uri": "/build.zip", "folder": false }]
            })))
            .mount(&server)
            .await;

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        assert!(!destination.exists("generic-local", "nightly").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        assert!(matches!(
            destination.exists("generic-local", "a.txt").await,
            Err(DestinationError::QueryFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_uploads_file_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/generic-local/dir/b.txt"))
            .and(body_bytes(b"bee".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let local = temp.path().join("b.txt");
        std::fs::write(&local, b"bee").unwrap();

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        destination
            .store(&local, "generic-local", "dir/b.txt")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_streams_large_file_with_length() {
        let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/generic-local/big.bin"))
            .and(header("content-length", data.len().to_string().as_str()))
            .and(body_bytes(data.clone()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let local = temp.path().join("big.bin");
        std::fs::write(&local, &data).unwrap();

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        destination
            .store(&local, "generic-local", "big.bin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let local = temp.path().join("b.txt");
        std::fs::write(&local, b"bee").unwrap();

        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();
        let err = destination
            .store(&local, "generic-local", "b.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DestinationError::UploadFailed { ref path, .. } if path == "generic-local/b.txt"
        ));
    }

    #[tokio::test]
    async fn test_store_missing_local_file() {
        let server = MockServer::start().await;
        let destination = ArtifactoryDestination::new(&config_for(&server)).unwrap();

        let err = destination
            .store(Path::new("/nonexistent/file"), "generic-local", "b.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, DestinationError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn test_basic_auth_with_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let config = ArtifactoryConfig {
            username: Some("mirror-bot".to_string()),
            ..config_for(&server)
        };
        let destination = ArtifactoryDestination::new(&config).unwrap();
        assert!(!destination.exists("generic-local", "a.txt").await.unwrap());
    }
}
