//! Error types for stream channel operations

use common::config::ConfigError;
use thiserror::Error;

/// Errors that can occur while establishing a stream channel
///
/// Once a channel is attached none of its data-path operations fail; only
/// creation and opening report errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// A named object already exists
    #[error("Shared object already exists: {name}")]
    AlreadyExists {
        /// Object name
        name: String,
    },

    /// A named object was not found
    #[error("Shared object not found: {name}")]
    NotFound {
        /// Object name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing shared object: {name}")]
    PermissionDenied {
        /// Object name
        name: String,
    },

    /// Chunk geometry cannot be laid out
    #[error(
        "Invalid chunk geometry: {chunk_count} chunks of {chunk_length} bytes \
         (need at least one chunk of 1..=2147483647 bytes)"
    )]
    InvalidGeometry {
        /// Requested chunk count
        chunk_count: u32,
        /// Requested chunk length
        chunk_length: u32,
    },

    /// Base name unusable as an object name
    #[error("Invalid base name: {name:?}")]
    InvalidName {
        /// Rejected name
        name: String,
    },

    /// Reader count outside the pending mask width
    #[error("Invalid reader count: {count} (must be 1..=31)")]
    InvalidReaderCount {
        /// Requested count
        count: u32,
    },

    /// Reader slot outside the channel's reader count
    #[error("Invalid reader index: {index} (channel has {reader_count} readers)")]
    InvalidReaderIndex {
        /// Requested slot
        index: u32,
        /// Readers the channel was opened for
        reader_count: u32,
    },

    /// Mapping does not match the header it carries
    #[error("Corrupt segment header in {name}: {reason}")]
    CorruptHeader {
        /// Mapping name
        name: String,
        /// What failed validation
        reason: String,
    },

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

impl StreamError {
    /// Classify an IO error raised while touching the object `name`.
    pub(crate) fn from_io(name: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                name: name.to_string(),
            },
            std::io::ErrorKind::NotFound => Self::NotFound {
                name: name.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                name: name.to_string(),
            },
            _ => Self::Io { source },
        }
    }
}

/// Result type for stream channel operations
pub type StreamResult<T> = Result<T, StreamError>;
