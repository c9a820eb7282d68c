//! # Shared Memory Chunked Stream
//!
//! A one-directional byte stream between processes on the same host. One
//! writer appends bytes into a ring of fixed-size chunks in a named shared
//! memory segment; one or more readers consume them in order. Synchronization
//! is a single atomic word per chunk plus two named wake-up signals, so no
//! lock is ever taken on the data path and no data is copied beyond what the
//! caller does itself.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐         <base>_M                ┌─────────────────┐
//! │   Writer        │  ┌───────────────────────────┐  │   Reader 0..N   │
//! │                 │  │ header │ state words │    │  │                 │
//! │ get_write_memory├─►│ chunk 0 │ chunk 1 │ ...   ├─►│ get_read_memory │
//! │ wait_to_write   │  └───────────────────────────┘  │ wait_to_read    │
//! │                 │◄──────── <base>_W ──────────────┤ (chunk released)│
//! │ (bytes added)   ├───────── <base>_R ─────────────►│                 │
//! └─────────────────┘                                 └─────────────────┘
//! ```
//!
//! The writer blocks only when it wants to reuse a chunk some reader has not
//! released yet. Readers block only when they have consumed everything
//! published so far.
//!
//! ## Usage
//!
//! ```rust
//! use shm_stream::Channel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Producer
//! let mut writer = Channel::create_new(None, 4, 1024)?;
//! let name = writer.name().unwrap_or_default().to_string();
//!
//! let memory = writer.get_write_memory();
//! memory[..5].copy_from_slice(b"hello");
//! writer.advance_write_position(5);
//! writer.mark_complete();
//!
//! // Consumer, normally in another process
//! let mut reader = Channel::open_existing(&name)?;
//! let mut received = Vec::new();
//! while !reader.is_complete() {
//!     match reader.get_read_memory() {
//!         Some(bytes) if !bytes.is_empty() => {
//!             received.extend_from_slice(bytes);
//!             let n = bytes.len();
//!             reader.advance_read_position(n);
//!         }
//!         _ => reader.wait_to_read(0),
//!     }
//! }
//! assert_eq!(received, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! For callers that would rather copy, [`Channel::stream_writer`] and
//! [`Channel::stream_reader`] adapt a handle to `std::io`.
//!
//! ## Thread Safety
//!
//! - A [`Channel`] is `Send` but its operations take `&mut self`: one handle
//!   per writer or reader, on whatever thread the caller picks.
//! - Exactly one handle may act as the writer of a channel.
//! - Each reader handle reads as its own slot, see [`Channel::select_reader`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod chunk_state;
pub mod error;
pub mod io;
pub mod naming;
pub mod platform;
pub mod reader;
pub mod segment;
pub mod writer;

pub use channel::Channel;
pub use chunk_state::{ChunkSnapshot, ChunkState, WritePhase};
pub use error::{StreamError, StreamResult};
pub use io::{StreamReader, StreamWriter};
pub use segment::{SegmentHeader, SegmentLayout};

use common::config::LogLevel;

/// Initialize tracing, filtered by `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize tracing at `level`, unless `RUST_LOG` says otherwise
pub fn init_tracing_with_level(level: LogLevel) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
