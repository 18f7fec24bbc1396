//! Configuration management for buildboard.
//!
//! Loads configuration from ${BUILDBOARD_HOME}/config.toml with defaults for
//! every key. Command-line flags and `BUILDBOARD_URL` are layered on top by the
//! CLI via [`Config::with_overrides`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::controller::RECONNECT_COOLDOWN;
use crate::transport::DEFAULT_RETRY_DELAY;
use crate::visibility::VisibilitySource;

/// Environment variable that overrides the configured endpoint.
pub const URL_ENV: &str = "BUILDBOARD_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Push endpoint (server-sent events).
    pub url: String,
    /// Minimum seconds between automatic reconnects.
    pub reconnect_cooldown_secs: u64,
    /// Native retry delay until the server sends `retry:`.
    pub retry_delay_ms: u64,
    pub visibility: VisibilitySource,
    /// Default log filter when neither BUILDBOARD_LOG nor RUST_LOG is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: Config::DEFAULT_URL.to_string(),
            reconnect_cooldown_secs: RECONNECT_COOLDOWN.as_secs(),
            retry_delay_ms: u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(3000),
            visibility: VisibilitySource::default(),
            log_level: None,
        }
    }
}

/// Returns the commented config template written by `config init`.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for buildboard configuration and log directories.
    //!
    //! BUILDBOARD_HOME resolution order:
    //! 1. BUILDBOARD_HOME environment variable (if set)
    //! 2. ~/.config/buildboard (default)
    //! 3. ./.buildboard when no home directory can be determined

    use std::path::PathBuf;

    pub fn buildboard_home() -> PathBuf {
        if let Ok(home) = std::env::var("BUILDBOARD_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".buildboard"),
            |h| h.join(".config").join("buildboard"),
        )
    }

    pub fn config_path() -> PathBuf {
        buildboard_home().join("config.toml")
    }

    pub fn logs_dir() -> PathBuf {
        buildboard_home().join("logs")
    }
}

impl Config {
    pub const DEFAULT_URL: &'static str = "http://127.0.0.1:8080/events";

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Applies command-line and environment overrides. A flag wins over the
    /// environment, which wins over the file.
    #[must_use]
    pub fn with_overrides(
        mut self,
        url: Option<String>,
        env_url: Option<String>,
        visibility: Option<VisibilitySource>,
    ) -> Self {
        if let Some(url) = url.or(env_url.filter(|u| !u.trim().is_empty())) {
            self.url = url;
        }
        if let Some(visibility) = visibility {
            self.visibility = visibility;
        }
        self
    }

    /// Parses the configured endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(self.url.trim()).with_context(|| format!("Invalid endpoint URL '{}'", self.url))
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_secs(self.reconnect_cooldown_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
