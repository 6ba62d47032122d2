//! Client configuration: defaults, then a TOML file, then environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_API_URL: &str = "FARMDASH_API_URL";
pub const ENV_AUTH_TOKEN: &str = "FARMDASH_AUTH_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "FARMDASH_TIMEOUT_SECS";
pub const ENV_CACHE_DIR: &str = "FARMDASH_CACHE_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            auth_token: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub recent_farms_limit: usize,
    pub posts_page_size: usize,
    pub weather_location: Option<String>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            recent_farms_limit: 5,
            posts_page_size: 5,
            weather_location: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for the file-backed offline store; in-memory when unset.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmdashConfig {
    pub api: ApiConfig,
    pub dashboard: DashboardSettings,
    pub cache: CacheConfig,
}

impl FarmdashConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overrides fields from environment-style lookups. Unparseable
    /// numbers are reported rather than ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            self.api.auth_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.api.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "api.timeout_secs",
                message: format!("{raw:?} is not a whole number of seconds"),
            })?;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache.directory = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                message: "must not be empty".into(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                message: format!("{url:?} must start with http:// or https://"),
            });
        }
        if self.dashboard.recent_farms_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "dashboard.recent_farms_limit",
                message: "must be greater than zero".into(),
            });
        }
        if self.dashboard.posts_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "dashboard.posts_page_size",
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Loads `.env`, the optional TOML file and the process environment, then
/// validates the result.
pub fn load_config(path: Option<&Path>) -> Result<FarmdashConfig> {
    dotenvy::dotenv().ok();

    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            FarmdashConfig::from_toml_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => FarmdashConfig::default(),
    };

    config
        .apply_env(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    config.validate().context("invalid farmdash configuration")?;
    Ok(config)
}
