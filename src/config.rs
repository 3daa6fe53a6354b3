use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RouteGuideConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub features_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Notes kept per location. Unset keeps every note for the process lifetime.
    pub history_limit: Option<usize>,
    /// Queue depth per live subscriber before it is evicted as too slow.
    pub subscriber_buffer: usize,
    /// Queue depth between a chat session and its connection writer.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8980,
            log_level: "info".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let features_path = default_routeguide_dir()
            .join("route_guide_db.json")
            .to_string_lossy()
            .into_owned();
        Self { features_path }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: None,
            subscriber_buffer: 64,
            outbound_buffer: 64,
        }
    }
}

/// Returns `~/.routeguide/`
pub fn default_routeguide_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routeguide")
}

/// Returns the default config file path: `~/.routeguide/config.toml`
pub fn default_config_path() -> PathBuf {
    default_routeguide_dir().join("config.toml")
}

impl RouteGuideConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RouteGuideConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (ROUTEGUIDE_FEATURES, ROUTEGUIDE_PORT, ROUTEGUIDE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("ROUTEGUIDE_FEATURES") {
            self.store.features_path = val;
        }
        if let Ok(val) = std::env::var("ROUTEGUIDE_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("ROUTEGUIDE_PORT is not a port number: {val}"))?;
        }
        if let Ok(val) = std::env::var("ROUTEGUIDE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        Ok(())
    }

    /// Resolve the feature database path, expanding `~` if needed.
    pub fn resolved_features_path(&self) -> PathBuf {
        expand_tilde(&self.store.features_path)
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
