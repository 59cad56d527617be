//! TOML-based server configuration.
//!
//! The control-plane consumes a small, flat set of network settings. Every
//! field carries a serde default so a partial file — or no file at all —
//! yields a working configuration:
//!
//! ```toml
//! server_port = 8080
//! broadcast_port = 8081
//! broadcast_interval_secs = 30
//! connection_timeout_secs = 5
//! max_connections = 50
//! bind_address = "0.0.0.0"
//! broadcast_address = "255.255.255.255"
//! identity = "server"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred while reading the config file.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Network settings consumed by the control-plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port the listener accepts client connections on.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// UDP port discovery broadcasts are sent to.
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,
    /// Seconds between discovery broadcasts.
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_secs: u64,
    /// Idle read timeout per client connection, in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
    /// Advisory connection cap. Exceeding it is logged, not enforced.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// IP address the TCP listener binds to. `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Destination address for discovery datagrams.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
    /// The `source` endpoint identifier stamped on outbound messages.
    #[serde(default = "default_identity")]
    pub identity: String,
}

fn default_server_port() -> u16 {
    8080
}
fn default_broadcast_port() -> u16 {
    8081
}
fn default_broadcast_interval() -> u64 {
    30
}
fn default_connection_timeout() -> u64 {
    5
}
fn default_max_connections() -> usize {
    50
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_broadcast_address() -> String {
    "255.255.255.255".to_string()
}
fn default_identity() -> String {
    "server".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            broadcast_port: default_broadcast_port(),
            broadcast_interval_secs: default_broadcast_interval(),
            connection_timeout_secs: default_connection_timeout(),
            max_connections: default_max_connections(),
            bind_address: default_bind_address(),
            broadcast_address: default_broadcast_address(),
            identity: default_identity(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file is not an error: it yields the defaults, so the server
    /// works on first run before any config has been written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// The pause between discovery broadcasts.
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast_interval_secs)
    }

    /// The per-connection idle read timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
