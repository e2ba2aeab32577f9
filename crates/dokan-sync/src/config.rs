//! # Sync Configuration
//!
//! Where the backend lives and how the cart sync queue behaves.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DOKAN_BACKEND_URL=https://api.example.com                          │
//! │     DOKAN_SYNC_ENABLED=false                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/dokan/sync.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.dokan.storefront/sync.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [backend]
//! url = "https://api.example.com"
//! timeout_secs = 15
//!
//! [sync]
//! enabled = true
//! batch_size = 50
//! poll_interval_secs = 5
//! max_attempts = 10
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! ```

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Backend Settings
// =============================================================================

/// The shop backend this storefront talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL; endpoints are joined below it (`{url}/api/...`).
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_timeout() -> u64 {
    15
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            url: default_backend_url(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Cart sync queue behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// When false, local cart mutations are never queued or replayed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Outbox entries replayed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Failed deliveries before an entry is left alone.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    50
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            enabled: default_true(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses one TOML file without consulting the environment.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        info!(?path, "Loading sync config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = self.backend_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.backend.url
            )));
        }

        if self.backend.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DOKAN_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DOKAN_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.url = url;
        }

        if let Some(raw) = lookup("DOKAN_BACKEND_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid DOKAN_BACKEND_TIMEOUT_SECS"),
            }
        }

        if let Some(raw) = lookup("DOKAN_SYNC_ENABLED") {
            match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.enabled = true,
                "0" | "false" | "no" | "off" => self.sync.enabled = false,
                _ => warn!(value = %raw, "Ignoring invalid DOKAN_SYNC_ENABLED"),
            }
        }

        if let Some(raw) = lookup("DOKAN_SYNC_BATCH_SIZE") {
            match raw.parse() {
                Ok(size) => self.sync.batch_size = size,
                Err(_) => warn!(value = %raw, "Ignoring invalid DOKAN_SYNC_BATCH_SIZE"),
            }
        }

        if let Some(raw) = lookup("DOKAN_SYNC_MAX_ATTEMPTS") {
            match raw.parse() {
                Ok(attempts) => self.sync.max_attempts = attempts,
                Err(_) => warn!(value = %raw, "Ignoring invalid DOKAN_SYNC_MAX_ATTEMPTS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "dokan", "storefront")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed base URL. A trailing slash is added so `join` keeps any path
    /// prefix (`https://shop.example.com/backend/`).
    pub fn backend_url(&self) -> SyncResult<Url> {
        let raw = self.backend.url.trim();
        if raw.ends_with('/') {
            Ok(Url::parse(raw)?)
        } else {
            Ok(Url::parse(&format!("{raw}/"))?)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs.max(1))
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.sync.enabled
    }

    /// Retry policy for failed sync cycles.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.sync.initial_backoff_ms),
            max_interval: Duration::from_secs(self.sync.max_backoff_secs),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_sync_enabled());
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.max_attempts, 10);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.backend.url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.backend.url = "not a url".into();
        assert!(config.validate().is_err());

        config.backend.url = "https://api.example.com".into();
        config.sync.batch_size = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_backend_url_keeps_path_prefix() {
        let mut config = SyncConfig::default();
        config.backend.url = "https://shop.example.com/backend".into();

        let joined = config.backend_url().unwrap().join("api/product/list").unwrap();
        assert_eq!(joined.as_str(), "https://shop.example.com/backend/api/product/list");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[backend]
url = "https://api.example.com"

[sync]
batch_size = 5
enabled = false
"#
        )
        .unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.backend.url, "https://api.example.com");
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.sync.batch_size, 5);
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.poll_interval_secs, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DOKAN_BACKEND_URL", "https://staging.example.com"),
            ("DOKAN_SYNC_ENABLED", "off"),
            ("DOKAN_SYNC_BATCH_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "https://staging.example.com");
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.batch_size, 50);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.toml");

        let mut config = SyncConfig::default();
        config.sync.max_attempts = 3;
        config.save(Some(path.clone())).unwrap();

        let reloaded = SyncConfig::from_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
