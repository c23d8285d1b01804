//! Repository engine configuration.
//!
//! Configuration is TOML, loaded from an explicit path or from the location
//! named by `RREPO_CONFIG_PATH`. Environment overrides are applied after
//! parsing and the result is validated before use.
//!
//! # Example
//!
//! ```no_run
//! use rrepo_core::config::RepoConfig;
//! use std::path::Path;
//!
//! # async fn example() -> rrepo_core::Result<()> {
//! let config = RepoConfig::load_from_path(Path::new("/etc/rrepo/config.toml")).await?;
//! println!("debounce: {:?}", config.debounce());
//! # Ok(())
//! # }
//! ```

use crate::error::{RepoError, Result};
use crate::types::WritePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

// Environment variable names
pub const ENV_CONFIG_PATH: &str = "RREPO_CONFIG_PATH";
pub const ENV_CONFIG_PROFILE: &str = "RREPO_CONFIG_PROFILE";
pub const ENV_LOG_LEVEL: &str = "RREPO_LOG_LEVEL";
pub const ENV_DEBOUNCE_MS: &str = "RREPO_DEBOUNCE_MS";
pub const ENV_METADATA_TTL_SECS: &str = "RREPO_METADATA_TTL_SECS";
pub const ENV_WRITE_POLICY: &str = "RREPO_WRITE_POLICY";
pub const ENV_REMOTE_URL: &str = "RREPO_REMOTE_URL";

/// Configuration profile enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfigProfile {
    /// Development profile with short debounce and verbose logging
    #[default]
    Dev,
    /// Production profile
    Prod,
    /// Test profile: rebuilds fire immediately
    Test,
}

impl ConfigProfile {
    /// Get profile from environment variable or default to Dev
    pub fn from_env() -> Self {
        std::env::var(ENV_CONFIG_PROFILE)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Dev)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
            Self::Test => "test",
        }
    }
}

impl std::str::FromStr for ConfigProfile {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            "test" | "testing" => Ok(Self::Test),
            _ => Err(RepoError::Config(format!(
                "Invalid config profile '{}'. Must be one of: dev, prod, test",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ConfigProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Configuration profile (dev, prod, test)
    #[serde(default)]
    profile: ConfigProfile,
    general: GeneralConfig,
    indexing: IndexingConfig,
    proxy: ProxyConfig,
    storage: StorageConfig,
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

/// Index rebuild scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Rebuild `PACKAGES.gz` after archive mutations
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between the first mutation in a directory and its rebuild
    pub debounce_ms: u64,
}

/// Proxy cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// How long a cached index document is served before revalidation
    pub metadata_ttl_secs: u64,
    /// Remote repository URL (empty for hosted repositories)
    #[serde(default)]
    pub remote_url: String,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub write_policy: WritePolicy,
}

fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 60_000,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: 86_400,
            remote_url: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::AllowOnce,
        }
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::with_profile(ConfigProfile::from_env())
    }
}

impl RepoConfig {
    /// Create configuration with profile-specific defaults
    pub fn with_profile(profile: ConfigProfile) -> Self {
        match profile {
            ConfigProfile::Dev => Self::dev_defaults(),
            ConfigProfile::Prod => Self::prod_defaults(),
            ConfigProfile::Test => Self::test_defaults(),
        }
    }

    fn dev_defaults() -> Self {
        Self {
            general: GeneralConfig {
                log_level: "debug".to_string(),
            },
            indexing: IndexingConfig {
                enabled: true,
                debounce_ms: 1_000,
            },
            proxy: ProxyConfig {
                metadata_ttl_secs: 3_600,
                remote_url: String::new(),
            },
            storage: StorageConfig {
                write_policy: WritePolicy::Allow,
            },
            profile: ConfigProfile::Dev,
        }
    }

    fn prod_defaults() -> Self {
        Self {
            general: GeneralConfig::default(),
            indexing: IndexingConfig::default(),
            proxy: ProxyConfig::default(),
            storage: StorageConfig::default(),
            profile: ConfigProfile::Prod,
        }
    }

    fn test_defaults() -> Self {
        Self {
            general: GeneralConfig {
                log_level: "debug".to_string(),
            },
            indexing: IndexingConfig {
                enabled: true,
                debounce_ms: 0,
            },
            proxy: ProxyConfig {
                metadata_ttl_secs: 60,
                remote_url: String::new(),
            },
            storage: StorageConfig {
                write_policy: WritePolicy::Allow,
            },
            profile: ConfigProfile::Test,
        }
    }

    pub fn profile(&self) -> ConfigProfile {
        self.profile
    }

    pub fn general(&self) -> &GeneralConfig {
        &self.general
    }

    pub fn general_mut(&mut self) -> &mut GeneralConfig {
        &mut self.general
    }

    pub fn indexing(&self) -> &IndexingConfig {
        &self.indexing
    }

    pub fn indexing_mut(&mut self) -> &mut IndexingConfig {
        &mut self.indexing
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    pub fn proxy_mut(&mut self) -> &mut ProxyConfig {
        &mut self.proxy
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageConfig {
        &mut self.storage
    }

    /// Rebuild debounce delay.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.indexing.debounce_ms)
    }

    /// Metadata revalidation interval.
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.proxy.metadata_ttl_secs)
    }
}

impl RepoConfig {
    /// Path named by `RREPO_CONFIG_PATH`, if set.
    pub fn config_path() -> Option<PathBuf> {
        std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from)
    }

    /// Load from `RREPO_CONFIG_PATH`, or fall back to profile defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the named file cannot be read, parsed or validated
    pub async fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path).await,
            None => {
                debug!("No {} set, using profile defaults", ENV_CONFIG_PATH);
                let mut config = Self::default();
                config.merge_env_vars()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RepoError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;

        // Apply environment variable overrides
        config.merge_env_vars()?;

        config.validate()?;

        info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Parse TOML without applying environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RepoError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a specific path atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        self.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RepoError::Config(format!("Failed to create config directory: {}", e)))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RepoError::Config(format!("Failed to serialize config: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("toml.tmp");

        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| RepoError::Config(format!("Failed to write config file: {}", e)))?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| RepoError::Config(format!("Failed to rename config file: {}", e)))?;

        info!("Configuration saved successfully to {}", path.display());
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(RepoError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.indexing.debounce_ms == 0 && self.profile != ConfigProfile::Test {
            warn!("Rebuild debounce is 0, every archive mutation triggers its own rebuild");
        }

        if self.proxy.metadata_ttl_secs == 0 {
            warn!("Metadata TTL is 0, cached index documents are revalidated on every request");
        }

        let remote = &self.proxy.remote_url;
        if !remote.is_empty() && !(remote.starts_with("http://") || remote.starts_with("https://")) {
            return Err(RepoError::Config(format!(
                "Invalid remote URL '{}'. Must start with http:// or https://",
                remote
            )));
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Merge environment variable overrides into the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, keyed by the `RREPO_*` names.
    pub fn merge_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!("Merging environment variable overrides");

        if let Some(log_level) = lookup(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", log_level);
            self.general.log_level = log_level;
        }

        if let Some(debounce) = lookup(ENV_DEBOUNCE_MS) {
            let ms = debounce.parse::<u64>().map_err(|e| {
                RepoError::Config(format!("Invalid debounce in environment: {}", e))
            })?;
            debug!("Overriding debounce from environment: {} ms", ms);
            self.indexing.debounce_ms = ms;
        }

        if let Some(ttl) = lookup(ENV_METADATA_TTL_SECS) {
            let secs = ttl.parse::<u64>().map_err(|e| {
                RepoError::Config(format!("Invalid metadata TTL in environment: {}", e))
            })?;
            debug!("Overriding metadata TTL from environment: {} s", secs);
            self.proxy.metadata_ttl_secs = secs;
        }

        if let Some(policy) = lookup(ENV_WRITE_POLICY) {
            debug!("Overriding write policy from environment: {}", policy);
            self.storage.write_policy = policy.parse()?;
        }

        if let Some(remote_url) = lookup(ENV_REMOTE_URL) {
            debug!("Overriding remote URL from environment");
            self.proxy.remote_url = remote_url;
        }

        Ok(())
    }
}
