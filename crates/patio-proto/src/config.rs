use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::gain::DEFAULT_MAX_GAIN_DB;
use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Where the player's web UI is served from.  The socket URL is derived
/// from `origin`, never configured directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Give up on a websocket handshake after this many seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// dB ceiling for the gain slider until the server reports `maxGain`.
    #[serde(default = "default_max_gain")]
    pub max_gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Lifetime of transient notifications.
    #[serde(default = "default_toast_secs")]
    pub toast_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            path: default_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_gain: default_max_gain(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_secs: default_toast_secs(),
        }
    }
}

fn default_origin() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_path() -> String {
    platform::SOCKET_PATH.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_gain() -> f64 {
    DEFAULT_MAX_GAIN_DB
}

fn default_toast_secs() -> u64 {
    4
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("writing {}", config_path.display()))?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs.max(1))
    }

    /// Socket URL derived from the configured origin.
    pub fn socket_url(&self) -> Result<String, platform::UrlError> {
        platform::socket_url(&self.server.origin, &self.server.path)
    }
}
