//! Global configuration management for solkit.
//!
//! The global configuration lives at `~/.solkit/config.toml` (or
//! `%LOCALAPPDATA%\solkit\config.toml` on Windows) and holds user-wide
//! settings: the portals solkit can talk to, which one is the default, and
//! the request and deployment tuning knobs.
//!
//! # Example
//!
//! ```toml
//! default_portal = "prod"
//! max_parallel = 4
//! retry_attempts = 3
//! request_timeout_secs = 60
//!
//! [portals.prod]
//! url = "https://www.example.com/portal/sharing/rest"
//! username = "publisher"
//! token = "YOUR_TOKEN"
//! ```
//!
//! # Security
//!
//! Tokens are passed through to the portal verbatim and never logged. The
//! file is written with `0600` permissions on Unix. When a portal entry has
//! no token, `SOLKIT_TOKEN` is used instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_MAX_PARALLEL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS,
    TOKEN_ENV,
};
use crate::core::SolkitError;

const fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

const fn default_retry_attempts() -> usize {
    DEFAULT_RETRY_ATTEMPTS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Connection settings for one portal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal's REST API, e.g. `https://host/portal/sharing/rest`
    pub url: String,
    /// User that owns created items
    pub username: String,
    /// Pre-issued access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PortalConfig {
    /// Token from the config, falling back to `SOLKIT_TOKEN`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token.clone().or_else(|| std::env::var(TOKEN_ENV).ok()).filter(|t| !t.is_empty())
    }
}

// Tokens must never end up in logs
impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Global configuration structure for solkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Known portals by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub portals: BTreeMap<String, PortalConfig>,

    /// Portal used when `--portal` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_portal: Option<String>,

    /// Items deployed at once within a dependency wave
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Retries for transport failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Timeout for each portal request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            portals: BTreeMap::new(),
            default_portal: None,
            max_parallel: default_max_parallel(),
            retry_attempts: default_retry_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, otherwise from the default location.
    ///
    /// A missing file yields the default configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save to a specific file, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Default config file path.
    ///
    /// `SOLKIT_CONFIG` overrides the platform location.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("solkit")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".solkit")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Add or replace a portal.
    pub fn add_portal(&mut self, name: impl Into<String>, portal: PortalConfig) {
        self.portals.insert(name.into(), portal);
    }

    /// Remove a portal. Returns whether it existed.
    pub fn remove_portal(&mut self, name: &str) -> bool {
        if self.default_portal.as_deref() == Some(name) {
            self.default_portal = None;
        }
        self.portals.remove(name).is_some()
    }

    /// Pick a portal by name, or the default one.
    ///
    /// Without a name, `default_portal` is used; if that is unset and exactly
    /// one portal is configured, that one is used.
    pub fn portal(&self, name: Option<&str>) -> Result<(&str, &PortalConfig), SolkitError> {
        let name = match name.or(self.default_portal.as_deref()) {
            Some(name) => name,
            None if self.portals.len() == 1 => {
                return self.portals.iter().next().map(|(k, v)| (k.as_str(), v)).ok_or_else(|| {
                    SolkitError::ConfigError {
                        message: "No portals configured".to_string(),
                    }
                });
            }
            None => {
                return Err(SolkitError::ConfigError {
                    message: if self.portals.is_empty() {
                        "No portals configured".to_string()
                    } else {
                        "Several portals configured and no default_portal set".to_string()
                    },
                });
            }
        };

        self.portals.get_key_value(name).map(|(k, v)| (k.as_str(), v)).ok_or_else(|| {
            SolkitError::ConfigError {
                message: format!("Portal '{name}' is not configured"),
            }
        })
    }

    /// Example configuration written by `solkit config init`.
    #[must_use]
    pub fn init_example() -> Self {
        let mut config = Self::default();
        config.add_portal(
            "prod",
            PortalConfig {
                url: "https://www.example.com/portal/sharing/rest".to_string(),
                username: "publisher".to_string(),
                token: Some("YOUR_TOKEN".to_string()),
            },
        );
        config.default_portal = Some("prod".to_string());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn portal(url: &str) -> PortalConfig {
        PortalConfig {
            url: url.to_string(),
            username: "me".to_string(),
            token: Some("secret-token".to_string()),
        }
    }

    #[tokio::test]
    async fn test_global_config_default() {
        let config = GlobalConfig::default();
        assert!(config.portals.is_empty());
        assert_eq!(config.max_parallel, 1);
        assert_eq!(config.retry_attempts, 3);
    }

    #[tokio::test]
    async fn test_global_config_save_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nested").join("config.toml");

        let mut config = GlobalConfig::default();
        config.add_portal("dev", portal("https://dev/sharing/rest"));
        config.max_parallel = 4;
        config.save_to(&config_path).await.unwrap();

        let loaded = GlobalConfig::load_from(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(loaded, GlobalConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "request_timeout_secs = 5\n").await.unwrap();
        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.request_timeout_secs, 5);
        assert_eq!(loaded.max_parallel, 1);
    }

    #[test]
    fn test_portal_selection() {
        let mut config = GlobalConfig::default();
        assert!(config.portal(None).is_err());

        config.add_portal("a", portal("https://a"));
        assert_eq!(config.portal(None).unwrap().0, "a");

        config.add_portal("b", portal("https://b"));
        assert!(config.portal(None).is_err());
        assert_eq!(config.portal(Some("b")).unwrap().1.url, "https://b");

        config.default_portal = Some("b".to_string());
        assert_eq!(config.portal(None).unwrap().0, "b");
        assert!(config.portal(Some("zzz")).is_err());

        assert!(config.remove_portal("b"));
        assert!(config.default_portal.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", portal("https://a"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("***"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_config_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("test-config.toml");

        GlobalConfig::init_example().save_to(&config_path).await.unwrap();

        let mode = tokio::fs::metadata(&config_path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Config file should have 600 permissions");
    }
}
