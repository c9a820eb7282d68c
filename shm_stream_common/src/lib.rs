//! Shared stream library
//!
//! This crate provides shared constants and configuration loading utilities
//! for the `shm_stream` workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Object naming, default geometry and hard limits
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! common = { package = "shm_stream_common", path = "../shm_stream_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use shm_stream_common::consts::*;
//! use shm_stream_common::config::{ChannelConfig, ConfigLoader};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
