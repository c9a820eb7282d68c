//! `std::io` adapters over a channel
//!
//! [`StreamWriter`] copies into the ring and rotates chunks as they fill.
//! [`StreamReader`] yields bytes until the stream is complete, then reports
//! end of file. Both borrow the channel, so a handle keeps its cursors when
//! the adapter is dropped.

use crate::channel::Channel;
use std::io::{self, BufRead, Read, Write};

fn not_attached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream channel is not attached")
}

/// Writer half as [`std::io::Write`]
#[derive(Debug)]
pub struct StreamWriter<'a> {
    channel: &'a mut Channel,
}

impl<'a> StreamWriter<'a> {
    /// Wrap a channel used as the writer.
    pub fn new(channel: &'a mut Channel) -> Self {
        Self { channel }
    }

    /// Mark the stream complete. Readers see end of file once they drain it.
    pub fn finish(self) -> io::Result<()> {
        if !self.channel.is_attached() {
            return Err(not_attached());
        }
        if !self.channel.write.completed {
            self.channel.mark_complete();
        }
        Ok(())
    }
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.channel.is_attached() {
            return Err(not_attached());
        }
        if self.channel.write.completed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream already marked complete",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let memory = self.channel.get_write_memory();
            let n = memory.len().min(buf.len());
            if n > 0 {
                memory[..n].copy_from_slice(&buf[..n]);
                self.channel.advance_write_position(n);
                return Ok(n);
            }
            self.channel.wait_to_write(0);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Bytes are visible to readers as soon as they are written
        Ok(())
    }
}

/// Reader half as [`std::io::Read`] and [`std::io::BufRead`]
#[derive(Debug)]
pub struct StreamReader<'a> {
    channel: &'a mut Channel,
}

impl<'a> StreamReader<'a> {
    /// Wrap a channel used as a reader.
    pub fn new(channel: &'a mut Channel) -> Self {
        Self { channel }
    }
}

impl BufRead for StreamReader<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if !self.channel.is_attached() {
            return Err(not_attached());
        }

        loop {
            let unread = self.channel.get_read_memory().map_or(0, <[u8]>::len);
            if unread > 0 || self.channel.is_complete() {
                break;
            }
            self.channel.wait_to_read(0);
        }
        Ok(self.channel.get_read_memory().unwrap_or_default())
    }

    fn consume(&mut self, amt: usize) {
        self.channel.advance_read_position(amt);
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl Channel {
    /// Borrow this handle as an [`io::Write`] sink.
    pub fn stream_writer(&mut self) -> StreamWriter<'_> {
        StreamWriter::new(self)
    }

    /// Borrow this handle as an [`io::Read`] source.
    pub fn stream_reader(&mut self) -> StreamReader<'_> {
        StreamReader::new(self)
    }
}
