//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::{ArtifactoryConfig, Config, MirrorConfig, StagingConfig};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_STAGING_DIRNAME: &str = "mirrorsync";
const DEFAULT_INTERVAL_SECS: u64 = 900;

const ENV_CONFIG_FILE: &str = "MIRRORSYNC_CONFIG_FILE";
const DEFAULT_CONFIG_PATH: &str = "/etc/mirrorsync.conf";

const MIRROR_SECTION_PREFIX: &str = "mirror.";

/// Source settings accepted in a `[mirror.{name}]` section.
const SOURCE_SETTINGS: &[&str] = &[
    // s3
    "bucket",
    "prefix",
    "region",
    "access_key",
    "secret_key",
    "endpoint_url",
    // github
    "repo",
    "token",
    "api_url",
];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid integer '{value}' for key '{key}': {source}")]
    InvalidInteger {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid interval '{value}' in section '{section}': must be greater than zero")]
    InvalidInterval { section: String, value: u64 },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },

    #[error("missing required field '{field}' in section '{section}'")]
    MissingRequiredField { section: String, field: String },

    #[error("no mirror named '{0}'")]
    UnknownMirror(String),

    #[error("unknown source type '{source_type}' in section '{section}' (expected s3 or github)")]
    UnknownSourceType { section: String, source_type: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to MIRRORSYNC_CONFIG_FILE env var, then /etc/mirrorsync.conf.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "staging.root", "mirror.nightly.interval"
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// Value Parsing
// =============================================================================

fn parse_u64_value(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidInteger {
            key: key.to_string(),
            value: value.to_string(),
            source: e,
        })
}

/// Parse an optional integer. Returns None if the key is not present.
fn parse_optional_u64(ini: &Ini, section: &str, key: &str) -> Result<Option<u64>> {
    match ini.get(section, key) {
        None => Ok(None),
        Some(v) => Ok(Some(parse_u64_value(key, &v)?)),
    }
}

/// Treat empty strings as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Ok(ResolvedConfigFile {
            path: Some(default_path),
            warning: None,
        });
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    Config {
        staging: StagingConfig {
            root: env::temp_dir().join(DEFAULT_STAGING_DIRNAME),
            default_interval: DEFAULT_INTERVAL_SECS,
        },
        artifactory: ArtifactoryConfig::default(),
        mirrors: HashMap::new(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
///
/// Unrecognized keys in mirror sections are reported through `warnings`.
fn apply_ini_to_config(config: &mut Config, ini: &Ini, warnings: &mut Vec<String>) -> Result<()> {
    // [staging] section
    if let Some(root) = non_empty(ini.get("staging", "root")) {
        config.staging.root = PathBuf::from(root);
    }
    if let Some(interval) = parse_optional_u64(ini, "staging", "default_interval")? {
        config.staging.default_interval = interval;
    }

    // [artifactory] section
    if let Some(url) = non_empty(ini.get("artifactory", "url")) {
        config.artifactory.url = url;
    }
    if let Some(username) = non_empty(ini.get("artifactory", "username")) {
        config.artifactory.username = Some(username);
    }
    if let Some(api_key) = non_empty(ini.get("artifactory", "api_key")) {
        config.artifactory.api_key = Some(api_key);
    }

    // [mirror.*] sections
    let map = ini.get_map_ref();
    for section_name in ini.sections() {
        let Some(mirror_name) = section_name.strip_prefix(MIRROR_SECTION_PREFIX) else {
            continue;
        };
        if mirror_name.is_empty() {
            return Err(ConfigError::MissingRequiredField {
                section: section_name.clone(),
                field: "name".to_string(),
            });
        }

        // A later file layers onto an earlier definition of the same mirror
        let mirror = config.mirrors.entry(mirror_name.to_string()).or_default();

        let Some(entries) = map.get(&section_name) else {
            continue;
        };
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();

        for key in keys {
            let value = entries
                .get(key)
                .cloned()
                .flatten()
                .unwrap_or_default();
            match key.as_str() {
                "target_repository" => mirror.target_repository = non_empty(Some(value)),
                "source" => mirror.source = non_empty(Some(value)),
                "interval" => mirror.interval = Some(parse_u64_value(key, &value)?),
                param if SOURCE_SETTINGS.contains(&param) => {
                    mirror.settings.insert(param.to_string(), value.trim().to_string());
                }
                param => warnings.push(format!(
                    "ignoring unknown setting '{}' in section [{}]",
                    param, section_name
                )),
            }
        }
    }

    Ok(())
}

/// Load and parse an INI file.
///
/// Section and key names are case-sensitive so mirror names are kept as written.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new_cs();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(3, '.').collect();

    match parts.as_slice() {
        // staging.root, staging.default_interval
        ["staging", param] => apply_staging_override(config, param, value),

        // artifactory.url, artifactory.username, artifactory.api_key
        ["artifactory", param] => apply_artifactory_override(config, param, value),

        // mirror.name.param
        ["mirror", name, param] if !name.is_empty() => {
            apply_mirror_override(config, name, param, value)
        }

        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key format".to_string(),
        }),
    }
}

fn apply_staging_override(config: &mut Config, param: &str, value: &str) -> Result<()> {
    match param {
        "root" => {
            config.staging.root = PathBuf::from(value);
            Ok(())
        }
        "default_interval" => {
            config.staging.default_interval = parse_u64_value(param, value)?;
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: format!("staging.{}", param),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_artifactory_override(config: &mut Config, param: &str, value: &str) -> Result<()> {
    match param {
        "url" => {
            config.artifactory.url = value.to_string();
            Ok(())
        }
        "username" => {
            config.artifactory.username = non_empty(Some(value.to_string()));
            Ok(())
        }
        "api_key" => {
            config.artifactory.api_key = non_empty(Some(value.to_string()));
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: format!("artifactory.{}", param),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_mirror_override(config: &mut Config, name: &str, param: &str, value: &str) -> Result<()> {
    if !is_mirror_param(param) {
        return Err(ConfigError::InvalidOverrideKey {
            key: format!("mirror.{}.{}", name, param),
            message: "unknown parameter".to_string(),
        });
    }

    let mirror = config.mirrors.entry(name.to_string()).or_default();
    match param {
        "target_repository" => mirror.target_repository = non_empty(Some(value.to_string())),
        "source" => mirror.source = non_empty(Some(value.to_string())),
        "interval" => mirror.interval = Some(parse_u64_value(param, value)?),
        _ => {
            mirror
                .settings
                .insert(param.to_string(), value.trim().to_string());
        }
    }
    Ok(())
}

fn is_mirror_param(param: &str) -> bool {
    matches!(param, "target_repository" | "source" | "interval") || SOURCE_SETTINGS.contains(&param)
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or /etc/mirrorsync.conf)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    let mut config = default_config();

    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini, &mut warnings)?;
    }

    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini, &mut warnings)?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> (Config, Vec<String>) {
        let mut ini = Ini::new_cs();
        ini.read(text.to_string()).unwrap();
        let mut config = default_config();
        let mut warnings = Vec::new();
        apply_ini_to_config(&mut config, &ini, &mut warnings).unwrap();
        (config, warnings)
    }

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.staging.root, env::temp_dir().join("mirrorsync"));
        assert_eq!(config.staging.default_interval, 900);
        assert!(config.artifactory.url.is_empty());
        assert!(config.mirrors.is_empty());
    }

    #[test]
    fn test_parse_ini_config() {
        let (config, warnings) = parse(
            r#"
[staging]
root = /var/tmp/mirrorsync
default_interval = 60

[artifactory]
url = https://artifacts.example.com/artifactory
username = mirror-bot
api_key = secret-key

[mirror.nightly]
target_repository = generic-local
source = s3
interval = 300
bucket = builds
prefix = nightly/
region = us-west-2
access_key = AKIAEXAMPLE
secret_key = secret

[mirror.Widget]
target_repository = github-releases
source = github
repo = acme/widget
"#,
        );

        assert!(warnings.is_empty());
        assert_eq!(config.staging.root, PathBuf::from("/var/tmp/mirrorsync"));
        assert_eq!(config.staging.default_interval, 60);
        assert_eq!(
            config.artifactory.url,
            "https://artifacts.example.com/artifactory"
        );
        assert_eq!(config.artifactory.username.as_deref(), Some("mirror-bot"));
        assert_eq!(config.artifactory.api_key.as_deref(), Some("secret-key"));

        let nightly = config.mirrors.get("nightly").unwrap();
        assert_eq!(nightly.target_repository.as_deref(), Some("generic-local"));
        assert_eq!(nightly.source.as_deref(), Some("s3"));
        assert_eq!(nightly.interval, Some(300));
        assert_eq!(nightly.settings.get("bucket").unwrap(), "builds");
        assert_eq!(nightly.settings.get("secret_key").unwrap(), "secret");

        // Mirror names keep their case
        let widget = config.mirrors.get("Widget").unwrap();
        assert_eq!(widget.interval, None);
        assert_eq!(widget.settings.get("repo").unwrap(), "acme/widget");
    }

    #[test]
    fn test_unknown_mirror_setting_warns() {
        let (config, warnings) = parse(
            r#"
[mirror.a]
target_repository = generic-local
source = s3
colour = blue
"#,
        );
        assert!(config.mirrors.contains_key("a"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("colour"));
        assert!(warnings[0].contains("[mirror.a]"));
    }

    #[test]
    fn test_invalid_interval_integer() {
        let mut ini = Ini::new_cs();
        ini.read("[mirror.a]\ninterval = soon\n".to_string())
            .unwrap();
        let mut config = default_config();
        let result = apply_ini_to_config(&mut config, &ini, &mut Vec::new());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidInteger { ref key, .. }) if key == "interval"
        ));
    }

    #[test]
    fn test_apply_override_staging() {
        let mut config = default_config();
        apply_override(&mut config, "staging.root", "/custom/path").unwrap();
        assert_eq!(config.staging.root, PathBuf::from("/custom/path"));

        apply_override(&mut config, "staging.default_interval", "30").unwrap();
        assert_eq!(config.staging.default_interval, 30);

        assert!(matches!(
            apply_override(&mut config, "staging.colour", "blue"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
    }

    #[test]
    fn test_apply_override_mirror() {
        let mut config = default_config();
        apply_override(&mut config, "mirror.tools.source", "github").unwrap();
        apply_override(&mut config, "mirror.tools.repo", "acme/tools").unwrap();
        apply_override(&mut config, "mirror.tools.interval", "120").unwrap();

        let mirror = config.mirrors.get("tools").unwrap();
        assert_eq!(mirror.source.as_deref(), Some("github"));
        assert_eq!(mirror.interval, Some(120));
        assert_eq!(mirror.settings.get("repo").unwrap(), "acme/tools");

        assert!(matches!(
            apply_override(&mut config, "mirror.tools.colour", "blue"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "mirror.tools", "x"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
    }

    #[test]
    fn test_read_config_layers_files_and_overrides() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base.conf");
        std::fs::write(
            &base,
            "[artifactory]\nurl = https://a.example.com\n\n[mirror.a]\ntarget_repository = one\nsource = s3\nbucket = b\n",
        )
        .unwrap();
        let layer = temp.path().join("override.conf");
        std::fs::write(&layer, "[mirror.a]\ntarget_repository = two\n").unwrap();

        let source = ConfigSource {
            config_file: Some(base),
            override_file: Some(layer),
            overrides: vec![("artifactory.url".to_string(), "https://b.example.com".to_string())],
        };
        let result = read_config(&source).unwrap();

        assert_eq!(result.config.artifactory.url, "https://b.example.com");
        let mirror = result.config.mirrors.get("a").unwrap();
        assert_eq!(mirror.target_repository.as_deref(), Some("two"));
        assert_eq!(mirror.source.as_deref(), Some("s3"));
        assert_eq!(mirror.settings.get("bucket").unwrap(), "b");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let source = ConfigSource {
            config_file: Some(PathBuf::from("/nonexistent/mirrorsync.conf")),
            ..Default::default()
        };
        assert!(matches!(
            read_config(&source),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let (config, _) = parse(
            "[artifactory]\nurl = u\napi_key = hunter2\n\n[mirror.a]\nsecret_key = hunter3\ntoken = hunter4\n",
        );
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("hunter3"));
        assert!(!debug.contains("hunter4"));
    }
}
