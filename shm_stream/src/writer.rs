//! Write-side operations of a channel
//!
//! The writer appends into its current chunk and publishes bytes by adding
//! to the chunk's length. When a chunk is full it tags it `MovedToNext`,
//! steps to the next chunk and waits until every reader has released that
//! chunk before starting a new lap in it. That wait is the only backpressure.

use crate::channel::{Attachment, Channel, WriteCursor};
use crate::chunk_state::WritePhase;
use crate::platform::{NamedSignal, block_until};
use std::time::{Duration, Instant};
use tracing::debug;

impl Channel {
    /// Free space in the current chunk, starting at its published length.
    ///
    /// Empty when the chunk is full, or while a timed-out rotation still
    /// waits for readers.
    pub fn get_write_memory(&mut self) -> &mut [u8] {
        let Some(attachment) = self.attachment.as_ref() else {
            debug_assert!(false, "get_write_memory on an unattached channel");
            return &mut [];
        };
        debug_assert!(!self.write.completed, "write after mark_complete");

        if self.write.reset_pending {
            return &mut [];
        }

        let arena = attachment.arena();
        let length = arena.state(self.write.chunk).load().length;
        let capacity = (arena.chunk_length() - length) as usize;
        // SAFETY: single writer, current chunk, at or above the published length.
        unsafe { arena.data_mut(self.write.chunk, length, capacity) }
    }

    /// Publish `n` bytes written into [`get_write_memory`](Self::get_write_memory)
    /// and wake readers.
    pub fn advance_write_position(&mut self, n: usize) {
        let Some(attachment) = self.attachment.as_ref() else {
            debug_assert!(false, "advance_write_position on an unattached channel");
            return;
        };
        debug_assert!(!self.write.completed, "write after mark_complete");
        debug_assert!(!self.write.reset_pending, "advance during a pending rotation");
        debug_assert!(
            n <= write_capacity(attachment, &self.write),
            "advanced past the chunk capacity"
        );
        if n == 0 {
            return;
        }

        attachment.arena().state(self.write.chunk).add_length(n as u32);
        attachment.reader_event.raise();
    }

    /// End the stream after the bytes published so far.
    ///
    /// A rotation left pending by a timed-out wait is finished first, so
    /// this may block on readers in that case only.
    pub fn mark_complete(&mut self) {
        let Some(attachment) = self.attachment.as_ref() else {
            debug_assert!(false, "mark_complete on an unattached channel");
            return;
        };
        debug_assert!(!self.write.completed, "mark_complete called twice");

        if self.write.reset_pending {
            finish_rotation(attachment, &mut self.write, None);
        }

        attachment
            .arena()
            .state(self.write.chunk)
            .mark(WritePhase::Complete);
        self.write.completed = true;
        attachment.reader_event.raise();
        debug!(name = %attachment.name, chunk = self.write.chunk, "Stream marked complete");
    }

    /// Make room to write.
    ///
    /// If the current capacity still equals `last_known_capacity`, the
    /// current chunk is handed to the readers and the writer moves to the
    /// next chunk, blocking until every reader has released it.
    pub fn wait_to_write(&mut self, last_known_capacity: usize) {
        self.wait_to_write_until(last_known_capacity, None);
    }

    /// [`wait_to_write`](Self::wait_to_write) bounded by `timeout`.
    ///
    /// Returns `false` if readers still hold the next chunk when the timeout
    /// expires. The rotation is then resumed by the next wait call.
    pub fn wait_to_write_timeout(&mut self, last_known_capacity: usize, timeout: Duration) -> bool {
        self.wait_to_write_until(last_known_capacity, Some(Instant::now() + timeout))
    }

    fn wait_to_write_until(&mut self, last_known_capacity: usize, deadline: Option<Instant>) -> bool {
        let Some(attachment) = self.attachment.as_ref() else {
            debug_assert!(false, "wait_to_write on an unattached channel");
            return true;
        };
        debug_assert!(!self.write.completed, "write after mark_complete");

        if !self.write.reset_pending {
            if write_capacity(attachment, &self.write) != last_known_capacity {
                return true;
            }

            let arena = attachment.arena();
            let from = self.write.chunk;
            arena.state(from).mark(WritePhase::MovedToNext);
            self.write.chunk = arena.layout().next_chunk(from);
            self.write.reset_pending = true;
            attachment.reader_event.raise();

            debug!(
                name = %attachment.name,
                from,
                to = self.write.chunk,
                "Writer rotating to next chunk"
            );
        }

        finish_rotation(attachment, &mut self.write, deadline)
    }
}

fn write_capacity(attachment: &Attachment, cursor: &WriteCursor) -> usize {
    if cursor.reset_pending {
        return 0;
    }
    let arena = attachment.arena();
    (arena.chunk_length() - arena.state(cursor.chunk).load().length) as usize
}

/// Wait for every reader to release the cursor's chunk, then start a new lap in it.
fn finish_rotation(attachment: &Attachment, cursor: &mut WriteCursor, deadline: Option<Instant>) -> bool {
    let state = attachment.arena().state(cursor.chunk);

    if !block_until(&attachment.writer_event, deadline, || {
        state.load().reader_mask == 0
    }) {
        return false;
    }

    state.reset(attachment.initial_reader_mask());
    cursor.reset_pending = false;
    attachment.reader_event.raise();
    true
}
