//! Configuration helper for interpreting config values.
//!
//! The `ConfigHelper` wraps a `Config` and resolves `[mirror.{name}]` sections
//! into [`MirrorDefinition`]s: default interval inheritance and source
//! selection happen here.

use std::path::Path;
use std::time::Duration;

use super::read_config::{ConfigError, Result};
use super::{ArtifactoryConfig, Config, MirrorConfig, MirrorDefinition};
use crate::source::{ObjectStoreSourceConfig, ReleaseAssetSourceConfig, SourceConfig, SourceType};

/// Helper for interpreting configuration values.
#[derive(Debug, Clone)]
pub struct ConfigHelper {
    config: Config,
}

impl ConfigHelper {
    /// Create a new ConfigHelper wrapping the given config.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn staging_root(&self) -> &Path {
        &self.config.staging.root
    }

    pub fn artifactory(&self) -> &ArtifactoryConfig {
        &self.config.artifactory
    }

    /// Names of the configured mirrors, sorted.
    pub fn mirror_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.config.mirrors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve every configured mirror, sorted by name.
    ///
    /// Fails on the first mirror that cannot be resolved.
    pub fn mirror_definitions(&self) -> Result<Vec<MirrorDefinition>> {
        self.mirror_names()
            .into_iter()
            .map(|name| self.mirror_definition(name))
            .collect()
    }

    /// Resolve a single mirror by name.
    ///
    /// Source settings are passed through as written; whether the chosen
    /// source has everything it needs is checked when the source is created.
    pub fn mirror_definition(&self, name: &str) -> Result<MirrorDefinition> {
        let section = format!("mirror.{}", name);
        let mirror = self
            .config
            .mirrors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownMirror(name.to_string()))?;

        let target_repository = mirror
            .target_repository
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingRequiredField {
                section: section.clone(),
                field: "target_repository".to_string(),
            })?
            .to_string();

        let interval = mirror
            .interval
            .unwrap_or(self.config.staging.default_interval);
        if interval == 0 {
            return Err(ConfigError::InvalidInterval {
                section,
                value: interval,
            });
        }

        let source = resolve_source(&section, mirror)?;

        Ok(MirrorDefinition {
            name: name.to_string(),
            target_repository,
            interval: Duration::from_secs(interval),
            source,
        })
    }
}

fn resolve_source(section: &str, mirror: &MirrorConfig) -> Result<SourceConfig> {
    let name = mirror
        .source
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequiredField {
            section: section.to_string(),
            field: "source".to_string(),
        })?;

    let source_type = SourceType::from_name(name).ok_or_else(|| ConfigError::UnknownSourceType {
        section: section.to_string(),
        source_type: name.to_string(),
    })?;

    let setting = |key: &str| mirror.settings.get(key).cloned().unwrap_or_default();
    let optional = |key: &str| {
        mirror
            .settings
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
    };

    Ok(match source_type {
        SourceType::ObjectStore => SourceConfig::ObjectStore(ObjectStoreSourceConfig {
            bucket: setting("bucket"),
            prefix: setting("prefix"),
            region: setting("region"),
            access_key: setting("access_key"),
            secret_key: setting("secret_key"),
            endpoint_url: optional("endpoint_url"),
        }),
        SourceType::ReleaseAssets => SourceConfig::ReleaseAssets(ReleaseAssetSourceConfig {
            repository: setting("repo"),
            token: optional("token"),
            api_url: optional("api_url"),
        }),
    })
}
