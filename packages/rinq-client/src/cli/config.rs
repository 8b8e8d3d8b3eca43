//! Configuration module
//!
//! Handles loading and saving client configuration as TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::subprotocol::{RINQ_CBOR, RINQ_JSON};

/// Main configuration structure for the Rinq client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Peer connection settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Peer connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// WebSocket URL of the peer
    #[serde(default = "default_url")]
    pub url: String,

    /// Offered subprotocols, most preferred first
    #[serde(default = "default_subprotocols")]
    pub subprotocols: Vec<String>,

    /// Handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Lifecycle events buffered ahead of the consumer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_url() -> String {
    "ws://localhost:8081".to_string()
}

fn default_subprotocols() -> Vec<String> {
    vec![RINQ_CBOR.to_string(), RINQ_JSON.to_string()]
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            subprotocols: default_subprotocols(),
            connect_timeout_secs: default_connect_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EndpointConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default_config()),
        }
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
