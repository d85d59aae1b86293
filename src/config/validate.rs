//! Configuration validation with range checks.

use super::VaultConfig;
use crate::error::ConfigError;

/// Perceptual fingerprints are 64 bits wide
const MAX_THRESHOLD: u32 = 64;

impl VaultConfig {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// A missing Pixvid key is not checked here: offline runs work without
    /// one. `require_pixvid_key` checks it when real hosts are built.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.duplicates.threshold > MAX_THRESHOLD {
            return Err(ConfigError::Validation(format!(
                "duplicates.threshold must be <= {}",
                MAX_THRESHOLD
            )));
        }
        if self.duplicates.algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "duplicates.algorithms must name at least one algorithm".into(),
            ));
        }
        if self.lifecycle.purge_concurrency == 0 {
            return Err(ConfigError::Validation(
                "lifecycle.purge_concurrency must be > 0".into(),
            ));
        }
        if self.hosts.pixvid.timeout_secs == 0 || self.hosts.imgbb.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "hosts.*.timeout_secs must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Validation(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }

    /// The Pixvid API key, or an error naming both ways to set it
    pub fn require_pixvid_key(&self) -> Result<&str, ConfigError> {
        self.hosts.pixvid.key().ok_or_else(|| {
            ConfigError::Validation(format!(
                "hosts.pixvid.api_key is required (or set {})",
                super::PIXVID_API_KEY_ENV
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::HashAlgorithmKind;

    #[test]
    fn default_config_passes_validation() {
        assert!(VaultConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_threshold_wider_than_fingerprint() {
        let mut config = VaultConfig::default();
        config.duplicates.threshold = 64;
        assert!(config.validate().is_ok());
        config.duplicates.threshold = 65;
        assert!(config.validate().unwrap_err().to_string().contains("threshold"));
    }

    #[test]
    fn rejects_empty_algorithm_list() {
        let mut config = VaultConfig::default();
        config.duplicates.algorithms = Vec::<HashAlgorithmKind>::new();
        assert!(config.validate().unwrap_err().to_string().contains("algorithms"));
    }

    #[test]
    fn rejects_zero_purge_concurrency() {
        let mut config = VaultConfig::default();
        config.lifecycle.purge_concurrency = 0;
        assert!(config.validate().unwrap_err().to_string().contains("purge_concurrency"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let mut config = VaultConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn pixvid_key_is_required_for_real_hosts() {
        let mut config = VaultConfig::default();
        assert!(config.require_pixvid_key().is_err());
        config.hosts.pixvid.api_key = Some("k".to_string());
        assert_eq!(config.require_pixvid_key().unwrap(), "k");
    }
}
