//! Configuration loading and typed config structures for the FFD daemon.
//!
//! The canonical configuration lives in `ffd-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads, overrides, and validates the file.
//! Every field has a default, so an empty document is a valid config.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Smallest accepted request buffer, in bytes.
pub const MIN_REQUEST_CAPACITY: usize = 16;

/// Largest accepted request buffer, in bytes.
pub const MAX_REQUEST_CAPACITY: usize = 1024 * 1024;

/// Longest accepted reaper period, in milliseconds.
pub const MAX_REAP_INTERVAL_MS: u64 = 1000;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its accepted range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FfdConfig {
    /// Listener and connection-handling settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FfdConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values after parsing:
    /// - `FFD_HOST` overrides `server.host`
    /// - `FFD_PORT` overrides `server.port`
    /// - `FFD_RECORDS` overrides `store.records_path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides and validation.
    ///
    /// # Errors
    ///
    /// As [`from_file`](Self::from_file), minus the I/O case.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `FFD_PORT` is not a port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FFD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FFD_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("FFD_PORT {port:?}: {e}")))?;
        }
        if let Some(path) = lookup("FFD_RECORDS") {
            self.store.records_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Check that every value is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if !(MIN_REQUEST_CAPACITY..=MAX_REQUEST_CAPACITY).contains(&self.server.request_capacity) {
            return Err(ConfigError::Invalid(format!(
                "server.request_capacity must be between {MIN_REQUEST_CAPACITY} and \
                 {MAX_REQUEST_CAPACITY} bytes, got {}",
                self.server.request_capacity
            )));
        }
        if self.server.reap_interval_ms == 0 || self.server.reap_interval_ms > MAX_REAP_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "server.reap_interval_ms must be between 1 and {MAX_REAP_INTERVAL_MS}, got {}",
                self.server.reap_interval_ms
            )));
        }
        if self.store.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "store.query_timeout_ms must be positive",
            )));
        }
        Ok(())
    }
}

/// Listener and connection-handling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. `::` listens on every IPv6 and (dual-stack) IPv4
    /// interface.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Pending-connection backlog passed to `listen`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Largest request head a worker will buffer, in bytes.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    /// Per-connection read deadline in milliseconds (`0` disables it).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// How often the reaper scans for finished workers, in milliseconds.
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
}

impl ServerConfig {
    /// The socket address described by `host` and `port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.host {:?}: {e}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Read deadline, or `None` when disabled.
    pub const fn read_timeout(&self) -> Option<Duration> {
        if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.read_timeout_ms))
        }
    }

    /// Reaper period.
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            request_capacity: default_request_capacity(),
            read_timeout_ms: default_read_timeout_ms(),
            reap_interval_ms: default_reap_interval_ms(),
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// YAML seed file for the in-memory store.
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,

    /// Deadline for a single store query, in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl StoreConfig {
    /// Query deadline.
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("::")
}

const fn default_port() -> u16 {
    8110
}

const fn default_backlog() -> u32 {
    20
}

const fn default_request_capacity() -> usize {
    8192
}

const fn default_read_timeout_ms() -> u64 {
    30_000
}

const fn default_reap_interval_ms() -> u64 {
    250
}

fn default_records_path() -> PathBuf {
    PathBuf::from("records.yaml")
}

const fn default_query_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    String::from("info")
}
