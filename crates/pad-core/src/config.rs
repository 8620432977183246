//! Configuration management for Padrelay
//!
//! Handles loading and saving of the relay proxy configuration: where to
//! listen, which backend to pair clients with, and the timeouts that bound
//! establishment, teardown and shutdown.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::brand::{DEFAULT_BACKEND_URL, DEFAULT_BIND_HOST, DEFAULT_BIND_PORT};
use crate::error::{RelayError, Result};

/// Main configuration for the relay proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host the proxy listens on
    pub bind_host: String,

    /// Port the proxy listens on (0 = random)
    pub bind_port: u16,

    /// WebSocket URL of the game backend, fixed for the process lifetime
    pub backend_url: String,

    /// Timeout for the outbound backend connection in milliseconds
    pub connect_timeout_ms: u64,

    /// Timeout for the inbound WebSocket handshake in milliseconds
    pub handshake_timeout_ms: u64,

    /// Upper bound for closing one transport during teardown in milliseconds
    pub close_timeout_ms: u64,

    /// Upper bound for draining every session on shutdown in milliseconds
    pub shutdown_timeout_ms: u64,

    /// Enable debug logging
    pub verbose: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 5_000,
            close_timeout_ms: 1_000,
            shutdown_timeout_ms: 5_000,
            verbose: false,
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| RelayError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Returns the default configuration directory
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("padrelay")
    }

    /// Returns the default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Checks the settings that can only be wrong at startup
    pub fn validate(&self) -> Result<()> {
        if self.bind_host.trim().is_empty() {
            return Err(RelayError::Config("bind_host must not be empty".to_string()));
        }

        // Built without TLS support, so secure backends cannot be dialled.
        let rest = self.backend_url.strip_prefix("ws://").ok_or_else(|| {
            RelayError::Config(format!(
                "backend_url must start with ws:// (got {})",
                self.backend_url
            ))
        })?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(RelayError::Config(format!(
                "backend_url has no host: {}",
                self.backend_url
            )));
        }

        if self.connect_timeout_ms == 0 || self.handshake_timeout_ms == 0 {
            return Err(RelayError::Config(
                "connect and handshake timeouts must be non-zero".to_string(),
            ));
        }

        // Zero here would drop legs without a close frame, or stop before any
        // session is torn down.
        if self.close_timeout_ms == 0 || self.shutdown_timeout_ms == 0 {
            return Err(RelayError::Config(
                "close and shutdown timeouts must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Listener address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Builder pattern: set bind host
    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    /// Builder pattern: set bind port
    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Builder pattern: set backend URL
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Builder pattern: set backend connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set inbound handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set per-leg close timeout used during teardown
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set shutdown drain timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder pattern: set verbose mode
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
