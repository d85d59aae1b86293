//! Configuration management for the vault.
//!
//! Loaded from `<config dir>/imgvault/config.toml` (see `default_path`),
//! with defaults for anything left out. API keys may instead come from
//! `PIXVID_API_KEY` and `IMGBB_API_KEY`, which win over the file.

mod validate;

use crate::core::hasher::HashAlgorithmKind;
use crate::core::hosts::{DEFAULT_IMGBB_ENDPOINT, DEFAULT_PIXVID_ENDPOINT};
use crate::core::lifecycle::DEFAULT_PURGE_CONCURRENCY;
use crate::core::record::DisplaySource;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PIXVID_API_KEY_ENV: &str = "PIXVID_API_KEY";
pub const IMGBB_API_KEY_ENV: &str = "IMGBB_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub index: IndexConfig,
    pub hosts: HostsConfig,
    pub duplicates: DuplicatesConfig,
    pub lifecycle: LifecycleConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Where records are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("index.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    pub pixvid: HostConfig,
    pub imgbb: HostConfig,
}

/// One image host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Ignored for the required host, which is always used
    pub enabled: bool,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl HostConfig {
    /// API key, if set and not blank
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Enabled and holding an API key
    pub fn is_configured(&self) -> bool {
        self.enabled && self.key().is_some()
    }
}

/// Near-duplicate detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    /// Largest Hamming distance (bits out of 64) still treated as the same photo
    pub threshold: u32,
    /// Algorithms that must all agree
    pub algorithms: Vec<HashAlgorithmKind>,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            algorithms: HashAlgorithmKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Trashed records purged at once when emptying the trash
    pub purge_concurrency: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            purge_concurrency: DEFAULT_PURGE_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Host whose URL is shown first
    pub source: DisplaySource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl VaultConfig {
    /// Load from the default location, or defaults if there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: VaultConfig = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Platform config directory, e.g. `~/.config/imgvault/config.toml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("imgvault")
            .join("config.toml")
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Required host endpoint, defaulted
    pub fn pixvid_endpoint(&self) -> &str {
        self.hosts.pixvid.endpoint.as_deref().unwrap_or(DEFAULT_PIXVID_ENDPOINT)
    }

    /// Optional host endpoint, defaulted
    pub fn imgbb_endpoint(&self) -> &str {
        self.hosts.imgbb.endpoint.as_deref().unwrap_or(DEFAULT_IMGBB_ENDPOINT)
    }

    fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(PIXVID_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.hosts.pixvid.api_key = Some(key);
        }
        if let Some(key) = lookup(IMGBB_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.hosts.imgbb.api_key = Some(key);
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imgvault")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.duplicates.threshold, 10);
        assert_eq!(config.duplicates.algorithms.len(), 3);
        assert_eq!(config.lifecycle.purge_concurrency, DEFAULT_PURGE_CONCURRENCY);
        assert_eq!(config.display.source, DisplaySource::Pixvid);
        assert!(config.index.path.ends_with("index.db"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: VaultConfig = toml::from_str(
            r#"
            [hosts.pixvid]
            api_key = "abc"

            [duplicates]
            threshold = 6
            algorithms = ["difference"]
            "#,
        )
        .unwrap();

        assert_eq!(config.hosts.pixvid.key(), Some("abc"));
        assert_eq!(config.duplicates.threshold, 6);
        assert_eq!(config.duplicates.algorithms, vec![HashAlgorithmKind::Difference]);
        assert_eq!(config.hosts.pixvid.timeout_secs, 60);
        assert_eq!(config.pixvid_endpoint(), DEFAULT_PIXVID_ENDPOINT);
    }

    #[test]
    fn env_keys_override_file() {
        let mut config = VaultConfig::default();
        config.hosts.pixvid.api_key = Some("from-file".to_string());

        config.apply_env_from(|name| match name {
            PIXVID_API_KEY_ENV => Some("from-env".to_string()),
            IMGBB_API_KEY_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.hosts.pixvid.key(), Some("from-env"));
        assert_eq!(config.hosts.imgbb.key(), None);
    }

    #[test]
    fn optional_host_needs_key_and_enabled() {
        let mut host = HostConfig::default();
        assert!(!host.is_configured());
        host.api_key = Some("k".to_string());
        assert!(host.is_configured());
        host.enabled = false;
        assert!(!host.is_configured());
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[duplicates]\nthreshold = 65").unwrap();

        let err = VaultConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn config_to_toml() {
        let toml = VaultConfig::default().to_toml().unwrap();
        assert!(toml.contains("[duplicates]"));
        assert!(toml.contains("[lifecycle]"));
    }
}
