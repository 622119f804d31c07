//! YAML configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Environment variables override the file; command-line flags override both.
//!
//! ```yaml
//! store:
//!   url: https://hazard.example.org/api
//!   api_key: abc123
//!   timeout_secs: 30
//! archive_dir: /data/hazard-archive
//! vs30: 400
//! investigation_time: 50
//! ```

use crate::error::{CliError, Result};
use hazlab_data::ARCHIVE_DIR_ENV;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the store URL.
pub const STORE_URL_ENV: &str = "HAZLAB_STORE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Hazard store connection.
    pub store: StoreConfig,
    /// Directory for curve archives.
    pub archive_dir: Option<PathBuf>,
    /// VS30 filter applied to curve queries.
    pub vs30: Option<u32>,
    /// Investigation time in years for PoE conversions.
    pub investigation_time: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            archive_dir: None,
            vs30: None,
            investigation_time: 50.0,
        }
    }
}

/// Hazard store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL of the hazard store service.
    pub url: String,
    /// Value sent in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl StoreConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML text. Empty text gives the defaults.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load `path` if given, else the defaults, then apply the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override settings from environment variables looked up with `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(STORE_URL_ENV).filter(|v| !v.is_empty()) {
            self.store.url = url;
        }
        if let Some(dir) = var(ARCHIVE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.archive_dir = Some(PathBuf::from(dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.investigation_time, 50.0);
        assert_eq!(config.store.timeout(), Duration::from_secs(60));
        assert!(config.vs30.is_none());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_yaml("store:\n  url: https://example.org\nvs30: 750\n").unwrap();
        assert_eq!(config.store.url, "https://example.org");
        assert_eq!(config.store.timeout_secs, 60);
        assert_eq!(config.vs30, Some(750));
        assert!(config.archive_dir.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_yaml("vs_30: 400\n").is_err());
        assert!(Config::from_yaml("store:\n  endpoint: x\n").is_err());
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [
            (STORE_URL_ENV, "https://env.example.org"),
            (ARCHIVE_DIR_ENV, "/tmp/arch"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.store.url, "https://env.example.org");
        assert_eq!(config.archive_dir, Some(PathBuf::from("/tmp/arch")));

        // Empty values leave the setting alone.
        let mut config = Config::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_resolve_reads_process_env() {
        let path = std::env::temp_dir().join(format!("hazlab-config-{}.yaml", std::process::id()));
        let yaml = "store:\n  url: https://file.example.org\n  timeout_secs: 5\n";
        std::fs::write(&path, yaml).unwrap();

        std::env::set_var(STORE_URL_ENV, "https://env.example.org");
        let config = Config::resolve(Some(&path)).unwrap();
        std::env::remove_var(STORE_URL_ENV);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.store.url, "https://env.example.org");
        assert_eq!(config.store.timeout_secs, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/hazlab.yaml").unwrap_err();
        assert!(matches!(err, CliError::ConfigRead { .. }));
    }
}
