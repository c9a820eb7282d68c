//! Platform capabilities: named shared memory and named wake-up signals
//!
//! The channel only needs two OS capabilities, each reachable by name from
//! any process: a shared memory region and a binary wake-up signal. Signals
//! carry no state of their own; every predicate lives in the chunk state
//! words, so a waiter always re-validates after waking.

use crate::error::StreamResult;
use common::consts::SPIN_LIMIT;
use std::ptr::NonNull;
use std::time::Instant;

pub mod linux;

pub use linux::{ShmRegion, ShmSignal, get_current_pid, monotonic_millis};

/// Named shared memory region
pub trait SharedRegion: Sized {
    /// Create a new zero-filled region of `size` bytes. Fails if `name` exists.
    fn create(name: &str, size: usize) -> StreamResult<Self>;

    /// Attach to an existing region.
    fn open(name: &str) -> StreamResult<Self>;

    /// Start of the mapping, page aligned
    fn base(&self) -> NonNull<u8>;

    /// Mapped length in bytes
    fn len(&self) -> usize;

    /// Whether this handle created the region
    fn is_owner(&self) -> bool;
}

/// Snapshot of a signal taken before re-validating a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTicket(pub(crate) u32);

/// Named binary wake-up signal
///
/// `raise` wakes every waiter. A waiter takes a [`SignalTicket`] with
/// `prepare`, re-checks its predicate, then calls `wait`; a raise that lands
/// between the two makes `wait` return at once.
pub trait NamedSignal: Sized {
    /// Create a new, unsignaled signal. Fails if `name` exists.
    fn create(name: &str) -> StreamResult<Self>;

    /// Attach to an existing signal.
    fn open(name: &str) -> StreamResult<Self>;

    /// Wake every current waiter.
    fn raise(&self);

    /// Snapshot the signal before checking a predicate.
    fn prepare(&self) -> SignalTicket;

    /// Sleep until raised after `ticket` was taken or `deadline` passes.
    /// May return spuriously.
    fn wait(&self, ticket: SignalTicket, deadline: Option<Instant>);
}

/// Block until `ready` holds, waking on `signal`.
///
/// Spins up to [`SPIN_LIMIT`] re-checks before each sleep. Returns `false`
/// if `deadline` passes first.
pub fn block_until<S: NamedSignal>(
    signal: &S,
    deadline: Option<Instant>,
    mut ready: impl FnMut() -> bool,
) -> bool {
    loop {
        for _ in 0..SPIN_LIMIT {
            if ready() {
                return true;
            }
            std::hint::spin_loop();
        }

        let ticket = signal.prepare();
        if ready() {
            return true;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        signal.wait(ticket, deadline);
    }
}
