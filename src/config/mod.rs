//! Configuration management for ClipShelf
//!
//! This module handles loading, validating, and saving the TOML
//! configuration for the ClipShelf service.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::rpc;

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "CLIPSHELF_CONFIG";

const MIN_MESSAGE_SIZE: usize = 1024;
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding error
    #[error("Failed to encode TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// RPC server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Storage settings
    #[serde(default)]
    pub database: DatabaseSection,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// RPC server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address the WebSocket server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Largest accepted request frame in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

// Default value functions
fn default_listen_addr() -> String {
    "127.0.0.1:2022".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_database_path() -> PathBuf {
    PathBuf::from("~/.local/share/clipshelf/clipshelf.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            database: DatabaseSection::default(),
            log_level: default_log_level(),
        }
    }
}

impl DatabaseSection {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from CLIPSHELF_CONFIG environment variable
    /// 2. ~/.config/clipshelf/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => {
                let mut config = Self::default();
                config.expand_paths();
                Ok(config)
            }
        }
    }

    /// Load configuration with an optional explicit path
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from_path(&path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clipshelf").join("config.toml"))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Expand tilde in paths
    fn expand_paths(&mut self) {
        self.database.path = expand_path(&self.database.path);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.listen_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Validation(format!(
                "listen_addr '{}' is not a socket address: {}",
                self.server.listen_addr, e
            ))
        })?;

        if self.server.max_message_size < MIN_MESSAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "max_message_size must be at least {} bytes",
                MIN_MESSAGE_SIZE
            )));
        }
        if self.server.max_message_size > MAX_MESSAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "max_message_size must not exceed {} bytes",
                MAX_MESSAGE_SIZE
            )));
        }

        if self.database.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "busy_timeout_ms must not exceed {}",
                MAX_BUSY_TIMEOUT_MS
            )));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// RPC server settings derived from this configuration
    pub fn server_config(&self) -> Result<rpc::ServerConfig, ConfigError> {
        let listen_addr = self
            .server
            .listen_addr
            .parse()
            .map_err(|e| ConfigError::Validation(format!("invalid listen_addr: {}", e)))?;

        Ok(rpc::ServerConfig {
            listen_addr,
            max_message_size: self.server.max_message_size,
        })
    }

    /// Write configuration to `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write the commented example configuration to the default location
    pub fn generate_example_config(force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = Self::default_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find config directory",
            ))
        })?;

        if !force && config_path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, Self::generate_example())?;
        Ok(config_path)
    }

    /// Commented example configuration
    pub fn generate_example() -> String {
        let config = Config::default();

        format!(
            r#"# ClipShelf Configuration File
# Location: ~/.config/clipshelf/config.toml

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# RPC server settings
[server]
# Address the WebSocket server listens on
listen_addr = "{}"
# Largest accepted request in bytes (1MB default)
max_message_size = {}

# Storage settings
[database]
# Path to the SQLite history database
path = "{}"
# Milliseconds to wait on a locked database
busy_timeout_ms = {}
"#,
            config.log_level,
            config.server.listen_addr,
            config.server.max_message_size,
            config.database.path.display(),
            config.database.busy_timeout_ms,
        )
    }
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
