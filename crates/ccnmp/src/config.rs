// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Home agent and mobile node configuration.

use crate::name::Name;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// How a redirect flushes the buffered interests of a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// One relay after the other, in buffering order.
    #[default]
    Sequential,
    /// All relays at once, bounded by the relay pool.
    Parallel,
}

/// Home agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAgentConfig {
    /// Local forwarder address (default: 127.0.0.1:9695)
    #[serde(default = "default_forwarder")]
    pub forwarder: SocketAddr,

    /// Prefixes the agent listens on (default: "/")
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Maximum concurrent relays
    #[serde(default = "default_relay_workers")]
    pub relay_workers: usize,

    /// Relay copy buffer (bytes)
    #[serde(default = "default_relay_chunk_size")]
    pub relay_chunk_size: usize,

    /// Bound on opening a relay stream (milliseconds)
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Redirect flush strategy
    #[serde(default)]
    pub flush_mode: FlushMode,

    /// Buffer interests for registered namespaces
    #[serde(default = "default_true")]
    pub storing_enabled: bool,

    /// Maximum buffered interests per namespace (0 = unbounded)
    #[serde(default = "default_max_pending")]
    pub max_pending_per_namespace: usize,

    /// Acknowledge duplicate registrations too
    #[serde(default)]
    pub ack_duplicate_register: bool,

    /// Re-buffer interests whose relay failed during a redirect flush
    #[serde(default)]
    pub requeue_failed_relays: bool,
}

fn default_forwarder() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9695))
}

fn default_prefixes() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_relay_workers() -> usize {
    8
}

fn default_relay_chunk_size() -> usize {
    1024
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_max_pending() -> usize {
    1024
}

impl Default for HomeAgentConfig {
    fn default() -> Self {
        Self {
            forwarder: default_forwarder(),
            prefixes: default_prefixes(),
            relay_workers: default_relay_workers(),
            relay_chunk_size: default_relay_chunk_size(),
            open_timeout_ms: default_open_timeout_ms(),
            flush_mode: FlushMode::Sequential,
            storing_enabled: true,
            max_pending_per_namespace: default_max_pending(),
            ack_duplicate_register: false,
            requeue_failed_relays: false,
        }
    }
}

impl HomeAgentConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Served prefixes as names.
    pub fn prefix_names(&self) -> Result<Vec<Name>, ConfigError> {
        self.prefixes
            .iter()
            .map(|p| parse_namespace("prefixes", p))
            .collect()
    }

    /// Get open timeout as Duration.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefixes.is_empty() {
            return Err(ConfigError::InvalidValue("prefixes cannot be empty".into()));
        }
        self.prefix_names()?;
        if self.relay_workers == 0 {
            return Err(ConfigError::InvalidValue("relay_workers cannot be 0".into()));
        }
        if self.relay_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "relay_chunk_size cannot be 0".into(),
            ));
        }
        if self.open_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("open_timeout_ms cannot be 0".into()));
        }
        Ok(())
    }
}

/// Mobile node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileNodeConfig {
    /// Directory whose files are served
    pub root_directory: PathBuf,

    /// Namespace registered with the home agent
    pub home_namespace: String,

    /// Namespace the node is reachable under (default: home namespace)
    #[serde(default)]
    pub foreign_namespace: Option<String>,

    /// Interval between redirect refreshes (seconds)
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_secs: u64,

    /// Ask the home agent to relay new interests immediately
    #[serde(default)]
    pub forward_asap: bool,

    /// Bound on waiting for the registration acknowledgement (milliseconds)
    #[serde(default = "default_register_timeout_ms")]
    pub register_timeout_ms: u64,

    /// File copy buffer (bytes)
    #[serde(default = "default_mobile_chunk_size")]
    pub chunk_size: usize,

    /// Local forwarder address (default: 127.0.0.1:9695)
    #[serde(default = "default_forwarder")]
    pub forwarder: SocketAddr,
}

fn default_refresh_rate() -> u64 {
    30
}

fn default_register_timeout_ms() -> u64 {
    5_000
}

fn default_mobile_chunk_size() -> usize {
    4096
}

impl MobileNodeConfig {
    /// Configuration with defaults for everything but the required fields.
    pub fn new(root_directory: impl Into<PathBuf>, home_namespace: impl Into<String>) -> Self {
        Self {
            root_directory: root_directory.into(),
            home_namespace: home_namespace.into(),
            foreign_namespace: None,
            refresh_rate_secs: default_refresh_rate(),
            forward_asap: false,
            register_timeout_ms: default_register_timeout_ms(),
            chunk_size: default_mobile_chunk_size(),
            forwarder: default_forwarder(),
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn home_name(&self) -> Result<Name, ConfigError> {
        parse_namespace("home_namespace", &self.home_namespace)
    }

    /// Foreign namespace, falling back to the home namespace.
    pub fn foreign_name(&self) -> Result<Name, ConfigError> {
        match &self.foreign_namespace {
            Some(ns) => parse_namespace("foreign_namespace", ns),
            None => self.home_name(),
        }
    }

    /// Get refresh interval as Duration.
    pub fn refresh_rate(&self) -> Duration {
        Duration::from_secs(self.refresh_rate_secs)
    }

    /// Get registration timeout as Duration.
    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root_directory.is_dir() {
            return Err(ConfigError::InvalidValue(format!(
                "root_directory {} is not a directory",
                self.root_directory.display()
            )));
        }
        if self.home_name()?.is_empty() {
            return Err(ConfigError::InvalidValue(
                "home_namespace cannot be the root".into(),
            ));
        }
        if self.foreign_name()?.is_empty() {
            return Err(ConfigError::InvalidValue(
                "foreign_namespace cannot be the root".into(),
            ));
        }
        if self.refresh_rate_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "refresh_rate_secs cannot be 0".into(),
            ));
        }
        if self.register_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "register_timeout_ms cannot be 0".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("chunk_size cannot be 0".into()));
        }
        Ok(())
    }
}

fn parse_namespace(field: &str, uri: &str) -> Result<Name, ConfigError> {
    Name::parse(uri).map_err(|e| ConfigError::InvalidValue(format!("{}: {}", field, e)))
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
