//! Configuration loading and persistence.
//!
//! Handles reading and writing the config entry: the JWT the integration was
//! set up with, the account it belongs to, and a few tunables. The JWT is the
//! only piece of state that survives a restart.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

use crate::constants;

/// Name of the config file inside the config directory.
const CONFIG_FILE: &str = "config.json";

/// Persisted configuration for comma-bridge.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// URL of the comma.ai API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// JWT used for every request. Empty until configured.
    #[serde(default)]
    pub jwt_token: String,
    /// Username the token resolved to at configuration time.
    ///
    /// Used as the entry's unique id, so the same account cannot be
    /// configured twice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Interval in seconds between refresh cycles.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

fn default_base_url() -> String {
    constants::API_BASE_URL.to_string()
}

fn default_update_interval() -> u64 {
    constants::UPDATE_INTERVAL.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            jwt_token: String::new(),
            username: None,
            update_interval: default_update_interval(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `COMMA_CONFIG_DIR` overrides the platform config dir
    /// (Linux: `~/.config/comma-bridge`).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("COMMA_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("comma-bridge")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the default directory, with environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_dir()?)
    }

    /// Loads configuration from `dir`, falling back to defaults when no
    /// file exists yet.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(dir)?.unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("COMMA_API_URL") {
            self.base_url = base_url;
        }

        // Token from env var (for CI/CD)
        if let Ok(token) = std::env::var("COMMA_JWT_TOKEN") {
            self.jwt_token = token;
        }

        if let Ok(interval) = std::env::var("COMMA_UPDATE_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(secs) if secs > 0 => self.update_interval = secs,
                _ => log::warn!("Ignoring invalid COMMA_UPDATE_INTERVAL={interval}"),
            }
        }
    }

    /// Persists the configuration to the default directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_dir()?)
    }

    /// Persists the configuration to `dir`.
    ///
    /// The file holds the JWT, so it is readable by the owner only.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE);
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Check if a token has been configured.
    pub fn has_token(&self) -> bool {
        !self.jwt_token.trim().is_empty()
    }

    /// Refresh interval as a [`Duration`], never below
    /// [`constants::MIN_UPDATE_INTERVAL`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval).max(constants::MIN_UPDATE_INTERVAL)
    }

    /// Entry title shown to the user.
    pub fn title(&self) -> String {
        format!(
            "comma.ai ({})",
            self.username.as_deref().unwrap_or(constants::DEFAULT_USERNAME)
        )
    }
}
