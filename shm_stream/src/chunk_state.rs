//! Per-chunk synchronization word
//!
//! Every chunk owns one 64-bit word shared by the writer and all readers.
//! It packs three fields:
//!
//! ```text
//!  63   62 61                          31 30                           0
//! ┌───────┬──────────────────────────────┬──────────────────────────────┐
//! │ phase │     reader pending mask      │      bytes written (len)     │
//! └───────┴──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! The word is the only datum mutated by both sides. All mutation goes
//! through [`ChunkState`]; the raw integer never leaves this module.

use std::sync::atomic::{AtomicU64, Ordering};

const LENGTH_BITS: u32 = 31;
const LENGTH_MASK: u64 = (1 << LENGTH_BITS) - 1;
const READER_SHIFT: u32 = LENGTH_BITS;
const READER_BITS: u32 = 31;
const READER_MASK: u64 = (1 << READER_BITS) - 1;
const PHASE_SHIFT: u32 = READER_SHIFT + READER_BITS;

/// Where the writer stands relative to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WritePhase {
    /// The writer may still append to this chunk.
    Writing = 0,
    /// The writer filled this chunk and moved to the next one.
    MovedToNext = 2,
    /// The stream ended in this chunk. Terminal.
    Complete = 3,
}

impl WritePhase {
    /// Decode the two phase bits.
    ///
    /// Phases are only ever OR-ed in, so `1` is never produced; it reads as
    /// `Writing`.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            2 => Self::MovedToNext,
            3 => Self::Complete,
            _ => Self::Writing,
        }
    }
}

/// Decoded copy of a chunk state word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSnapshot {
    /// Writer phase tag.
    pub phase: WritePhase,
    /// One bit per reader slot still holding the chunk.
    pub reader_mask: u32,
    /// Bytes written in the current lap.
    pub length: u32,
}

impl ChunkSnapshot {
    /// Whether `reader` still holds this chunk.
    #[inline]
    pub const fn is_pending(&self, reader: u32) -> bool {
        self.reader_mask & (1 << reader) != 0
    }
}

/// Pack the three fields into one word.
#[inline]
pub const fn encode(phase: WritePhase, reader_mask: u32, length: u32) -> u64 {
    ((phase as u64) << PHASE_SHIFT)
        | (((reader_mask as u64) & READER_MASK) << READER_SHIFT)
        | ((length as u64) & LENGTH_MASK)
}

/// Unpack a word.
#[inline]
pub const fn decode(word: u64) -> ChunkSnapshot {
    ChunkSnapshot {
        phase: WritePhase::from_bits(word >> PHASE_SHIFT),
        reader_mask: ((word >> READER_SHIFT) & READER_MASK) as u32,
        length: (word & LENGTH_MASK) as u32,
    }
}

/// Test a single reader's pending bit.
#[inline]
pub const fn has_reader_pending(word: u64, reader: u32) -> bool {
    word & (1 << (READER_SHIFT + reader)) != 0
}

/// Atomic chunk state word, laid out in place inside the shared segment.
#[repr(transparent)]
#[derive(Debug)]
pub struct ChunkState(AtomicU64);

impl ChunkState {
    /// Fresh word in the given state.
    pub const fn new(phase: WritePhase, reader_mask: u32, length: u32) -> Self {
        Self(AtomicU64::new(encode(phase, reader_mask, length)))
    }

    /// Atomic read.
    #[inline]
    pub fn load(&self) -> ChunkSnapshot {
        decode(self.0.load(Ordering::Acquire))
    }

    /// Whether `reader` still holds this chunk.
    #[inline]
    pub fn has_reader_pending(&self, reader: u32) -> bool {
        has_reader_pending(self.0.load(Ordering::Acquire), reader)
    }

    /// Publish `n` more bytes. Returns the previous state.
    ///
    /// The caller keeps `length + n` within the 31-bit field.
    #[inline]
    pub fn add_length(&self, n: u32) -> ChunkSnapshot {
        decode(self.0.fetch_add(u64::from(n), Ordering::AcqRel))
    }

    /// Start a new lap: `(Writing, reader_mask, 0)`. Returns the previous state.
    #[inline]
    pub fn reset(&self, reader_mask: u32) -> ChunkSnapshot {
        decode(
            self.0
                .swap(encode(WritePhase::Writing, reader_mask, 0), Ordering::AcqRel),
        )
    }

    /// OR a phase tag in. Returns the previous state.
    #[inline]
    pub fn mark(&self, phase: WritePhase) -> ChunkSnapshot {
        decode(
            self.0
                .fetch_or((phase as u64) << PHASE_SHIFT, Ordering::AcqRel),
        )
    }

    /// Clear `reader`'s pending bit. Returns the previous state.
    #[inline]
    pub fn release_reader(&self, reader: u32) -> ChunkSnapshot {
        decode(
            self.0
                .fetch_and(!(1u64 << (READER_SHIFT + reader)), Ordering::AcqRel),
        )
    }
}
