//! Read-side operations of a channel
//!
//! Each reader walks the ring on its own cursor. A chunk stays readable for
//! a reader while its bit is set in the chunk's pending mask; once the writer
//! has moved on and the reader drained the chunk, the reader clears its bit
//! and follows to the next chunk.

use crate::channel::Channel;
use crate::chunk_state::WritePhase;
use crate::platform::{NamedSignal, block_until};
use std::time::{Duration, Instant};
use tracing::trace;

impl Channel {
    /// Unread bytes of the current chunk for this reader.
    ///
    /// `None` while the reader's bit is clear, meaning the writer has not
    /// started the chunk's next lap yet.
    pub fn get_read_memory(&self) -> Option<&[u8]> {
        let attachment = self.attachment.as_ref()?;
        let arena = attachment.arena();
        let state = arena.state(self.read.chunk).load();
        if !state.is_pending(self.read.reader) {
            return None;
        }

        debug_assert!(self.read.offset <= state.length, "read offset past chunk length");
        let offset = self.read.offset.min(state.length);
        // SAFETY: bytes below the published length are never rewritten while
        // this reader's bit is set.
        Some(unsafe { arena.data(self.read.chunk, offset, (state.length - offset) as usize) })
    }

    /// Consume `n` bytes returned by [`get_read_memory`](Self::get_read_memory).
    pub fn advance_read_position(&mut self, n: usize) {
        debug_assert!(
            n == 0 || self.get_read_memory().is_some_and(|unread| n <= unread.len()),
            "advanced past the unread bytes"
        );
        self.read.offset += n as u32;
    }

    /// Whether this reader consumed every byte of a completed stream.
    pub fn is_complete(&self) -> bool {
        let Some(attachment) = self.attachment.as_ref() else {
            return false;
        };
        let state = attachment.arena().state(self.read.chunk).load();
        state.is_pending(self.read.reader)
            && state.phase == WritePhase::Complete
            && self.read.offset == state.length
    }

    /// Block until more than `current_length` unread bytes are available,
    /// or the stream is complete.
    ///
    /// Drained chunks the writer has left are released on the way, which
    /// unblocks a writer waiting to reuse them.
    pub fn wait_to_read(&mut self, current_length: usize) {
        self.wait_to_read_until(current_length, None);
    }

    /// [`wait_to_read`](Self::wait_to_read) bounded by `timeout`.
    ///
    /// Returns `false` if nothing new arrived in time.
    pub fn wait_to_read_timeout(&mut self, current_length: usize, timeout: Duration) -> bool {
        self.wait_to_read_until(current_length, Some(Instant::now() + timeout))
    }

    fn wait_to_read_until(&mut self, mut current_length: usize, deadline: Option<Instant>) -> bool {
        let Some(attachment) = self.attachment.as_ref() else {
            debug_assert!(false, "wait_to_read on an unattached channel");
            return false;
        };
        let arena = attachment.arena();
        let reader = self.read.reader;

        loop {
            let state = arena.state(self.read.chunk);
            let snapshot = state.load();

            if !snapshot.is_pending(reader) {
                // Writer has not reset this chunk for us yet
                if !block_until(&attachment.reader_event, deadline, || {
                    state.has_reader_pending(reader)
                }) {
                    return false;
                }
                continue;
            }

            let offset = self.read.offset as usize;
            let length = snapshot.length as usize;
            if offset + current_length < length || snapshot.phase == WritePhase::Complete {
                return true;
            }

            match snapshot.phase {
                WritePhase::Writing => {
                    if !block_until(&attachment.reader_event, deadline, || {
                        state.load() != snapshot
                    }) {
                        return false;
                    }
                }
                WritePhase::MovedToNext if offset < length => {
                    // Never release a chunk with bytes the caller has not consumed
                    return true;
                }
                WritePhase::MovedToNext => {
                    let from = self.read.chunk;
                    state.release_reader(reader);
                    attachment.writer_event.raise();

                    self.read.chunk = arena.layout().next_chunk(from);
                    self.read.offset = 0;
                    current_length = 0;
                    trace!(
                        name = %attachment.name,
                        reader,
                        from,
                        to = self.read.chunk,
                        "Reader released chunk"
                    );
                }
                WritePhase::Complete => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::Channel;
    use std::time::Duration;

    fn pair(chunk_count: u32, chunk_length: u32) -> (Channel, Channel) {
        let writer = Channel::create_new(None, chunk_count, chunk_length).unwrap();
        let reader = Channel::open_existing(writer.name().unwrap()).unwrap();
        (writer, reader)
    }

    fn push(channel: &mut Channel, data: &[u8]) {
        channel.get_write_memory()[..data.len()].copy_from_slice(data);
        channel.advance_write_position(data.len());
    }

    #[test]
    fn test_reads_published_bytes_only() {
        let (mut writer, mut reader) = pair(2, 8);
        assert_eq!(reader.get_read_memory(), Some(&[][..]));

        push(&mut writer, b"abc");
        assert_eq!(reader.get_read_memory(), Some(&b"abc"[..]));

        reader.advance_read_position(2);
        assert_eq!(reader.get_read_memory(), Some(&b"c"[..]));
        assert!(!reader.is_complete());
    }

    #[test]
    fn test_wait_returns_when_data_available() {
        let (mut writer, mut reader) = pair(2, 8);
        push(&mut writer, b"xy");
        assert!(reader.wait_to_read_timeout(0, Duration::from_millis(10)));
        assert!(reader.wait_to_read_timeout(1, Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_times_out_without_data() {
        let (mut writer, mut reader) = pair(2, 8);
        assert!(!reader.wait_to_read_timeout(0, Duration::from_millis(20)));

        push(&mut writer, b"xy");
        // Caller already saw both bytes
        assert!(!reader.wait_to_read_timeout(2, Duration::from_millis(20)));
    }

    #[test]
    fn test_drained_chunk_is_released() {
        let (mut writer, mut reader) = pair(2, 4);
        push(&mut writer, b"0123");
        writer.wait_to_write(0);
        push(&mut writer, b"45");

        assert_eq!(reader.get_read_memory(), Some(&b"0123"[..]));
        reader.advance_read_position(4);

        assert!(reader.wait_to_read_timeout(0, Duration::from_millis(50)));
        assert_eq!(reader.read.chunk, 1);
        assert_eq!(reader.get_read_memory(), Some(&b"45"[..]));

        let chunk0 = writer.attachment.as_ref().unwrap().arena().state(0).load();
        assert_eq!(chunk0.reader_mask, 0);
    }

    #[test]
    fn test_unread_bytes_hold_the_chunk() {
        let (mut writer, mut reader) = pair(2, 4);
        push(&mut writer, b"0123");
        writer.wait_to_write(0);

        reader.advance_read_position(1);
        assert!(reader.wait_to_read_timeout(3, Duration::from_millis(10)));
        assert_eq!(reader.read.chunk, 0);
        assert_eq!(reader.get_read_memory(), Some(&b"123"[..]));
    }

    #[test]
    fn test_complete_after_consuming_everything() {
        let (mut writer, mut reader) = pair(2, 8);
        push(&mut writer, b"done");
        writer.mark_complete();

        assert!(!reader.is_complete());
        assert!(reader.wait_to_read_timeout(4, Duration::from_millis(10)));
        reader.advance_read_position(4);
        assert!(reader.is_complete());
        assert!(reader.wait_to_read_timeout(0, Duration::from_millis(10)));
        assert!(reader.is_complete());
    }

    #[test]
    fn test_unattached_reader() {
        let channel = Channel::new();
        assert_eq!(channel.get_read_memory(), None);
        assert!(!channel.is_complete());
    }
}
