//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for processes that establish stream channels.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shm_stream_common::config::{ConfigLoader, StreamConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = StreamConfig::load(Path::new("stream.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_CHUNK_COUNT, DEFAULT_CHUNK_LENGTH, DEFAULT_READER_COUNT, MAX_CHUNK_LENGTH,
    MAX_READERS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across processes.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "compute-worker-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_chunk_count() -> u32 {
    DEFAULT_CHUNK_COUNT
}

fn default_chunk_length() -> u32 {
    DEFAULT_CHUNK_LENGTH
}

fn default_reader_count() -> u32 {
    DEFAULT_READER_COUNT
}

/// Geometry and naming of one stream channel.
///
/// # TOML Example
///
/// ```toml
/// [channel]
/// name = "Local_COMPUTE_jobs"
/// chunk_count = 8
/// chunk_length = 4096
/// reader_count = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Base name; a unique one is generated when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Number of chunks in the ring.
    #[serde(default = "default_chunk_count")]
    pub chunk_count: u32,

    /// Capacity of each chunk in bytes.
    #[serde(default = "default_chunk_length")]
    pub chunk_length: u32,

    /// Number of reader slots every chunk waits on before reuse.
    #[serde(default = "default_reader_count")]
    pub reader_count: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: None,
            chunk_count: DEFAULT_CHUNK_COUNT,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            reader_count: DEFAULT_READER_COUNT,
        }
    }
}

impl ChannelConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `name` is present but empty
    /// - `chunk_count` is zero
    /// - `chunk_length` is zero or exceeds [`MAX_CHUNK_LENGTH`]
    /// - `reader_count` is zero or exceeds [`MAX_READERS`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.name.as_deref(), Some("")) {
            return Err(ConfigError::ValidationError(
                "channel name cannot be empty".to_string(),
            ));
        }
        if self.chunk_count == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_count must be at least 1".to_string(),
            ));
        }
        if self.chunk_length == 0 || self.chunk_length > MAX_CHUNK_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "chunk_length must be within 1..={MAX_CHUNK_LENGTH}, got {}",
                self.chunk_length
            )));
        }
        if self.reader_count == 0 || self.reader_count > MAX_READERS {
            return Err(ConfigError::ValidationError(format!(
                "reader_count must be within 1..={MAX_READERS}, got {}",
                self.reader_count
            )));
        }
        Ok(())
    }
}

/// Top-level configuration file of a stream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Process-wide settings.
    pub shared: SharedConfig,

    /// Channel geometry.
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl StreamConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.channel.validate()
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
