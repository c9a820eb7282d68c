//! Segment layout and bounded accessors into a mapped segment
//!
//! A segment is laid out once at creation time:
//!
//! ```text
//! offset 0                          SegmentHeader { chunk_count, chunk_length }
//! offset 8                          ChunkState[chunk_count]      (u64, native-endian)
//! offset 8 + chunk_count * 8        ChunkData[chunk_count][chunk_length]
//! ```
//!
//! All addressing goes through [`ChunkArena`], which takes `(base, chunk_index)`
//! and checks `chunk_index < chunk_count` on every access.

use crate::chunk_state::ChunkState;
use crate::error::{StreamError, StreamResult};
use common::consts::MAX_CHUNK_LENGTH;
use static_assertions::const_assert_eq;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr::NonNull;

/// Fixed segment header, written once by the creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SegmentHeader {
    /// Number of chunks in the ring
    pub chunk_count: u32,
    /// Capacity in bytes of each chunk's data region
    pub chunk_length: u32,
}

const_assert_eq!(size_of::<SegmentHeader>(), 8);
const_assert_eq!(size_of::<ChunkState>(), 8);

/// Read the header at the start of a mapping.
///
/// # Safety
///
/// `base` must point to at least `size_of::<SegmentHeader>()` mapped bytes,
/// 4-byte aligned.
pub unsafe fn read_header(base: NonNull<u8>) -> SegmentHeader {
    // SAFETY: upheld by the caller.
    unsafe { base.as_ptr().cast::<SegmentHeader>().read_volatile() }
}

/// Size and offset math for one `(chunk_count, chunk_length)` geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    chunk_count: u32,
    chunk_length: u32,
    total_size: usize,
}

impl SegmentLayout {
    /// Validate a geometry and compute its total size.
    pub fn new(chunk_count: u32, chunk_length: u32) -> StreamResult<Self> {
        let invalid = || StreamError::InvalidGeometry {
            chunk_count,
            chunk_length,
        };

        if chunk_count == 0 || chunk_length == 0 || chunk_length > MAX_CHUNK_LENGTH {
            return Err(invalid());
        }

        let count = chunk_count as usize;
        let total_size = count
            .checked_mul(size_of::<ChunkState>())
            .and_then(|states| {
                count
                    .checked_mul(chunk_length as usize)
                    .and_then(|data| states.checked_add(data))
            })
            .and_then(|body| body.checked_add(size_of::<SegmentHeader>()))
            .ok_or_else(invalid)?;

        Ok(Self {
            chunk_count,
            chunk_length,
            total_size,
        })
    }

    /// Recover the layout a mapped header describes.
    pub fn from_header(header: &SegmentHeader) -> StreamResult<Self> {
        Self::new(header.chunk_count, header.chunk_length)
    }

    /// Number of chunks
    pub const fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Capacity of each chunk in bytes
    pub const fn chunk_length(&self) -> u32 {
        self.chunk_length
    }

    /// Bytes needed for the whole segment
    pub const fn total_size(&self) -> usize {
        self.total_size
    }

    /// Header this layout writes
    pub const fn header(&self) -> SegmentHeader {
        SegmentHeader {
            chunk_count: self.chunk_count,
            chunk_length: self.chunk_length,
        }
    }

    /// Byte offset of chunk `index`'s state word
    pub const fn state_offset(&self, index: u32) -> usize {
        size_of::<SegmentHeader>() + index as usize * size_of::<ChunkState>()
    }

    /// Byte offset of chunk `index`'s data region
    pub const fn data_offset(&self, index: u32) -> usize {
        self.state_offset(self.chunk_count) + index as usize * self.chunk_length as usize
    }

    /// Ring successor of chunk `index`
    #[inline]
    pub const fn next_chunk(&self, index: u32) -> u32 {
        (index + 1) % self.chunk_count
    }
}

/// Typed view over a mapped segment.
///
/// The lifetime ties the view to the mapping it was built from.
#[derive(Debug, Clone, Copy)]
pub struct ChunkArena<'a> {
    base: NonNull<u8>,
    layout: SegmentLayout,
    _mapping: PhantomData<&'a [u8]>,
}

impl<'a> ChunkArena<'a> {
    /// Build a view over `base`.
    ///
    /// # Safety
    ///
    /// `base` must be 8-byte aligned and point to at least
    /// `layout.total_size()` bytes that stay mapped for `'a`.
    pub unsafe fn new(base: NonNull<u8>, layout: SegmentLayout) -> Self {
        debug_assert_eq!(base.as_ptr() as usize % std::mem::align_of::<ChunkState>(), 0);
        Self {
            base,
            layout,
            _mapping: PhantomData,
        }
    }

    /// Geometry of the viewed segment
    pub fn layout(&self) -> SegmentLayout {
        self.layout
    }

    /// Capacity of each chunk in bytes
    pub fn chunk_length(&self) -> u32 {
        self.layout.chunk_length
    }

    /// Write the header and the initial chunk states.
    ///
    /// Chunk 0 starts a lap for `reader_mask`; every other chunk starts with
    /// no reader pending so the writer's first visit never waits.
    pub fn initialize(&self, reader_mask: u32) {
        // SAFETY: the header lies at offset 0 of a mapping at least
        // `total_size` long, and nothing else references it yet.
        unsafe {
            self.base
                .as_ptr()
                .cast::<SegmentHeader>()
                .write(self.layout.header());
        }
        for index in 0..self.layout.chunk_count {
            self.state(index)
                .reset(if index == 0 { reader_mask } else { 0 });
        }
    }

    /// Header as stored in the mapping
    pub fn header(&self) -> SegmentHeader {
        // SAFETY: offset 0 is in bounds and aligned for `SegmentHeader`.
        unsafe { read_header(self.base) }
    }

    /// State word of chunk `index`
    pub fn state(&self, index: u32) -> &'a ChunkState {
        assert!(index < self.layout.chunk_count, "chunk index out of range");
        // SAFETY: the offset is in bounds for `index < chunk_count`, 8-byte
        // aligned, and the word is only accessed atomically.
        unsafe {
            &*self
                .base
                .as_ptr()
                .add(self.layout.state_offset(index))
                .cast::<ChunkState>()
        }
    }

    fn data_ptr(&self, index: u32, offset: u32, len: usize) -> *mut u8 {
        assert!(index < self.layout.chunk_count, "chunk index out of range");
        assert!(
            offset as usize + len <= self.layout.chunk_length as usize,
            "chunk data range out of bounds"
        );
        // SAFETY: bounds checked above against the layout.
        unsafe {
            self.base
                .as_ptr()
                .add(self.layout.data_offset(index) + offset as usize)
        }
    }

    /// Bytes `offset..offset + len` of chunk `index`, for reading.
    ///
    /// # Safety
    ///
    /// The range must be published (below the chunk's `length`) and the
    /// caller's pending bit must stay set while the slice is alive.
    pub unsafe fn data(&self, index: u32, offset: u32, len: usize) -> &'a [u8] {
        let ptr = self.data_ptr(index, offset, len);
        // SAFETY: in bounds; the writer never touches published bytes of a
        // chunk until every reader released it.
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }

    /// Bytes `offset..offset + len` of chunk `index`, for writing.
    ///
    /// # Safety
    ///
    /// Only the single writer may call this, on its current chunk, for a
    /// range at or above the chunk's published `length`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn data_mut(&self, index: u32, offset: u32, len: usize) -> &'a mut [u8] {
        let ptr = self.data_ptr(index, offset, len);
        // SAFETY: in bounds; readers never look past the published length.
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}
