//! # Configuration Management
//!
//! Centralized configuration for the dispatch server.
//!
//! This module provides structured configuration for the TCP server, the
//! router cycle and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Read Buffer
//! Every router cycle performs one read of at most `router.max_read_len`
//! bytes (default [`MAX_READ_BUF_LEN`]). Messages longer than that are
//! truncated to what a single read returns.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::Level;

use crate::core::packet::{HEADER_LEN, MAX_BODY_LEN};
use crate::error::{DispatchError, Result};

/// Default upper bound of a single router read
pub const MAX_READ_BUF_LEN: usize = 1024;

/// Default timeout for graceful shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "PACKET_DISPATCH_";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `PACKET_DISPATCH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by full variable name.
    ///
    /// Recognised keys (after [`ENV_PREFIX`]): `SERVER_ADDRESS`,
    /// `MAX_CONNECTIONS`, `READ_TIMEOUT_MS`, `MAX_READ_LEN`, `LOG_LEVEL`.
    /// A value that does not parse is a `ConfigError`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(addr) = var("SERVER_ADDRESS") {
            self.server.address = addr;
        }
        if let Some(max) = parse_override(var("MAX_CONNECTIONS"), "MAX_CONNECTIONS")? {
            self.server.max_connections = max;
        }
        if let Some(ms) = parse_override(var("READ_TIMEOUT_MS"), "READ_TIMEOUT_MS")? {
            self.server.read_timeout_ms = ms;
        }
        if let Some(len) = parse_override(var("MAX_READ_LEN"), "MAX_READ_LEN")? {
            self.router.max_read_len = len;
        }
        if let Some(level) = parse_override(var("LOG_LEVEL"), "LOG_LEVEL")? {
            self.logging.log_level = level;
        }
        Ok(self)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to serialize config: {e}")))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .map_err(|e| DispatchError::ConfigError(format!("Failed to write config file: {e}")))
    }

    /// Every problem found, empty when the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.server.validate();
        errors.extend(self.router.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Like [`validate`](Self::validate), folded into a single `ConfigError`.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        Err(DispatchError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

fn parse_override<T: FromStr>(value: Option<String>, name: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                DispatchError::ConfigError(format!("Invalid value for {ENV_PREFIX}{name}: '{raw}'"))
            })
        })
        .transpose()
}

/// Listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:9000"
    pub address: String,

    pub max_connections: usize,

    /// Per-read deadline on accepted connections in milliseconds; 0 disables it
    pub read_timeout_ms: u64,

    /// How long shutdown waits for open connections, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            max_connections: 1000,
            read_timeout_ms: 0,
            shutdown_timeout_ms: SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    /// Read deadline for accepted connections, `None` when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address '{}' (expected host:port, e.g. 0.0.0.0:9000)",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        if (1..10).contains(&self.read_timeout_ms) {
            errors.push("Read timeout too short (minimum: 10ms, or 0 to disable)".to_string());
        }

        match self.shutdown_timeout_ms {
            0..=999 => errors.push("Shutdown timeout too short (minimum: 1s)".to_string()),
            60_001.. => errors.push("Shutdown timeout too long (maximum: 60s)".to_string()),
            _ => {}
        }

        errors
    }
}

/// Router cycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Upper bound, in bytes, of the single read performed per cycle
    pub max_read_len: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_read_len: MAX_READ_BUF_LEN,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Vec<String> {
        let limit = HEADER_LEN + MAX_BODY_LEN;
        if self.max_read_len < HEADER_LEN {
            vec![format!(
                "Max read length too small: {} (minimum: {HEADER_LEN}, the packet header size)",
                self.max_read_len
            )]
        } else if self.max_read_len > limit {
            vec![format!(
                "Max read length too large: {} (maximum: {limit})",
                self.max_read_len
            )]
        } else {
            Vec::new()
        }
    }
}

/// Subscriber settings consumed by [`init_logging`](crate::utils::logging::init_logging)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub app_name: String,

    /// Default level when `RUST_LOG` is not set
    #[serde(serialize_with = "serialize_level", deserialize_with = "deserialize_level")]
    pub log_level: Level,

    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-dispatch"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        if self.app_name.is_empty() {
            vec!["Application name cannot be empty".to_string()]
        } else {
            Vec::new()
        }
    }
}

fn serialize_level<S>(level: &Level, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&level.as_str().to_ascii_lowercase())
}

fn deserialize_level<'de, D>(deserializer: D) -> std::result::Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse()
        .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {raw}")))
}
