//! Configuration types for mirrorsync.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file, and the resolved per-mirror
//! definitions built from it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::source::SourceConfig;

/// Mirror settings whose values are never shown in debug output.
const SECRET_SETTINGS: &[&str] = &["secret_key", "token"];

// =============================================================================
// Config Sections
// =============================================================================

/// [staging] section - local staging area shared by all mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    /// Each mirror stages downloads under `root/<mirror name>`.
    pub root: PathBuf,
    /// Poll interval in seconds for mirrors that do not set their own.
    pub default_interval: u64,
}

/// [artifactory] section - the destination artifact repository.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ArtifactoryConfig {
    pub url: String,
    pub username: Option<String>,
    pub api_key: Option<String>,
}

impl fmt::Debug for ArtifactoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactoryConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// [mirror.{name}] section - one mirror, as written in the config.
///
/// Fields are optional here; they are checked when the section is resolved
/// into a [`MirrorDefinition`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MirrorConfig {
    pub target_repository: Option<String>,
    /// Poll interval in seconds.
    pub interval: Option<u64>,
    /// Source discriminator (`s3` or `github`).
    pub source: Option<String>,
    /// Source-specific connection settings.
    pub settings: BTreeMap<String, String>,
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings: BTreeMap<&str, &str> = self
            .settings
            .iter()
            .map(|(key, value)| {
                if SECRET_SETTINGS.contains(&key.as_str()) {
                    (key.as_str(), "<redacted>")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("MirrorConfig")
            .field("target_repository", &self.target_repository)
            .field("interval", &self.interval)
            .field("source", &self.source)
            .field("settings", &settings)
            .finish()
    }
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub staging: StagingConfig,
    pub artifactory: ArtifactoryConfig,
    pub mirrors: HashMap<String, MirrorConfig>,
}

// =============================================================================
// Resolved Definitions
// =============================================================================

/// Everything needed to run one sync agent. Created once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDefinition {
    /// Agent name; also names the agent's staging directory.
    pub name: String,
    /// Repository in the destination that objects are stored into.
    pub target_repository: String,
    /// Time between the end of one iteration and the start of the next.
    pub interval: Duration,
    pub source: SourceConfig,
}
