//! System-wide constants for the stream workspace.
//!
//! Single source of truth for object naming, default geometry and hard
//! limits. Imported by all crates.

use std::path::PathBuf;

/// Suffix of the data mapping derived from a base name (`B_M`).
pub const MAPPING_SUFFIX: &str = "_M";

/// Suffix of the reader-event signal (`B_R`), raised by the writer.
pub const READER_SIGNAL_SUFFIX: &str = "_R";

/// Suffix of the writer-event signal (`B_W`), raised by readers.
pub const WRITER_SIGNAL_SUFFIX: &str = "_W";

/// Scope prefix for generated base names.
///
/// Objects are visible to the current user session only.
pub const LOCAL_SCOPE_PREFIX: &str = "Local_";

/// Tag placed after the scope prefix in generated base names.
pub const DEFAULT_NAME_TAG: &str = "COMPUTE_";

/// Default number of chunks in the ring.
pub const DEFAULT_CHUNK_COUNT: u32 = 16;

/// Default capacity of each chunk in bytes (64 KiB).
pub const DEFAULT_CHUNK_LENGTH: u32 = 64 * 1024;

/// Default number of reader slots.
pub const DEFAULT_READER_COUNT: u32 = 1;

/// Largest chunk capacity representable by the 31-bit length field.
pub const MAX_CHUNK_LENGTH: u32 = (1 << 31) - 1;

/// Number of reader slots in the 31-bit pending mask.
pub const MAX_READERS: u32 = 31;

/// Predicate re-checks performed before a waiter goes to sleep.
pub const SPIN_LIMIT: u32 = 64;

/// File mode for every object created in the shm root (owner read/write).
pub const OBJECT_MODE: u32 = 0o600;

/// Directory holding named shared memory objects.
#[cfg(target_os = "linux")]
pub fn shm_root() -> PathBuf {
    PathBuf::from("/dev/shm")
}

/// Directory holding named shared memory objects.
#[cfg(not(target_os = "linux"))]
pub fn shm_root() -> PathBuf {
    std::env::temp_dir()
}
