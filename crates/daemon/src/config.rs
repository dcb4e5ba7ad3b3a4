//! Configuration management for the RPCS daemon.
//!
//! This module provides TOML-based configuration file loading.
//! The default configuration path is `~/.config/rpcs/config.toml`.
//! Environment variables (`RPCS_SECRET`, `RPCS_PORT`, `RPCS_SKEW`,
//! `RPCS_LOG_FILE`, `RPCS_LOG_LEVEL`) override file values.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protocol::SharedSecret;
use serde::Deserialize;
use thiserror::Error;

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 9097;

/// Default clock-skew tolerance in seconds.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = protocol::DEFAULT_CLOCK_SKEW_SECS;

/// Default cap on concurrently running dispatched commands.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    InvalidPort,

    #[error("clock_skew_secs must be between 1 and 3600, got {0}")]
    InvalidClockSkew(u64),

    #[error("max_in_flight must be between 1 and 64, got {0}")]
    InvalidMaxInFlight(usize),

    #[error("bind_address must be an IP address, got {0}")]
    InvalidBindAddress(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the RPCS daemon.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// UDP server configuration.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// UDP server configuration.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the UDP socket to.
    pub bind_address: String,

    /// UDP port.
    pub port: u16,

    /// Maximum allowed distance between a request timestamp and local time.
    pub clock_skew_secs: u64,

    /// Maximum number of dispatched commands running at once.
    pub max_in_flight: usize,

    /// Shared HMAC secret. The server does not start without one.
    pub secret: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,

    /// Log file path. Defaults to `~/.local/share/rpcs/rpcs.log`.
    pub file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            secret: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("max_in_flight", &self.max_in_flight)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The shared secret, if one is configured and not blank.
    pub fn shared_secret(&self) -> Option<SharedSecret> {
        self.secret
            .as_deref()
            .and_then(|s| SharedSecret::new(s.as_bytes().to_vec()).ok())
    }
}

impl LoggingConfig {
    /// Resolved log file path, or `None` when no home directory is known.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.clone().or_else(default_log_path)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rpcs")
        .join("config.toml")
}

/// Returns the default log file path.
fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("rpcs").join("rpcs.log"))
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - RPCS_SECRET: Shared HMAC secret
    /// - RPCS_PORT: UDP port
    /// - RPCS_SKEW: Clock-skew tolerance in seconds
    /// - RPCS_LOG_FILE: Log file path
    /// - RPCS_LOG_LEVEL: Log level (trace, debug, info, warn, error)
    ///
    /// Blank values are ignored. Values other than the secret are trimmed.
    /// Unparseable numbers are ignored and reported
    /// in the returned list, since logging is usually not set up yet.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        // The secret is key material, so surrounding whitespace is kept.
        if let Some(secret) = env_raw("RPCS_SECRET") {
            self.server.secret = Some(secret);
        }

        if let Some(port) = env_value("RPCS_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => notes.push(format!(
                    "Ignoring RPCS_PORT={:?}: not a valid port, using {}",
                    port, self.server.port
                )),
            }
        }

        if let Some(skew) = env_value("RPCS_SKEW") {
            match skew.parse::<u64>() {
                Ok(skew) => self.server.clock_skew_secs = skew,
                Err(_) => notes.push(format!(
                    "Ignoring RPCS_SKEW={:?}: not a number of seconds, using {}",
                    skew, self.server.clock_skew_secs
                )),
            }
        }

        if let Some(file) = env_value("RPCS_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }

        if let Some(level) = env_value("RPCS_LOG_LEVEL") {
            self.logging.level = level;
        }

        notes
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if !(1..=3600).contains(&self.server.clock_skew_secs) {
            return Err(ConfigError::InvalidClockSkew(self.server.clock_skew_secs));
        }

        if !(1..=64).contains(&self.server.max_in_flight) {
            return Err(ConfigError::InvalidMaxInFlight(self.server.max_in_flight));
        }

        self.server.socket_addr()?;

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/rpcs/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }
}

/// Read a non-blank environment variable, trimmed.
fn env_value(name: &str) -> Option<String> {
    env_raw(name).map(|v| v.trim().to_string())
}

/// Read a non-blank environment variable exactly as set.
fn env_raw(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
