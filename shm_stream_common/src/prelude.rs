//! Prelude module for common re-exports.
//!
//! ```rust
//! use shm_stream_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ChannelConfig, ConfigError, ConfigLoader, SharedConfig, StreamConfig};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::consts::{MAX_CHUNK_LENGTH, MAX_READERS};
