//! Configuration data model and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration for the interception layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Listener settings.
    pub network: NetworkConfig,
    /// Stream-resolution settings.
    pub intercept: InterceptConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub bind_address: String,
    /// Port to listen on.
    pub bind_port: u16,
    /// Maximum concurrent intercepted connections.
    pub max_connections: u32,
}

/// Stream-resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterceptConfig {
    /// Decorator depth past which a stream chain is treated as cyclic.
    pub max_unwrap_depth: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 7777,
            max_connections: 256,
        }
    }
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            max_unwrap_depth: 64,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Persistence ---

/// Name of the config file inside the config directory.
const CONFIG_FILE: &str = "config.ron";

impl Config {
    /// Load `config.ron` from `config_dir`. A missing file is not an error:
    /// defaults are written there and returned, so a fresh install starts
    /// with an editable file on disk.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);

        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config =
            ron::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        Ok(config)
    }

    /// Write this config to `config.ron` under `config_dir`, creating the
    /// directory if needed.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new().depth_limit(2);
        let rendered = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&path, rendered).map_err(|source| ConfigError::Write { path, source })?;
        Ok(())
    }
}
