//! Brickyard Configuration System
//!
//! Global user settings for the `brick` tool, stored in
//! `~/.brickyard/config.toml`.
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Settings file (`$BRICK_HOME/config.toml`, default `~/.brickyard/config.toml`)
//! 3. Environment variables (`BRICK_*`)
//! 4. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use brick_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load().unwrap();
//! println!("cache at {}", config.cache_path().display());
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader};
pub use settings::{Settings, VendorConfig};
