//! Channel handle: creation, attachment and release of the three named objects

use crate::error::{StreamError, StreamResult};
use crate::naming::{
    default_base_name, mapping_name, reader_signal_name, validate_base_name, writer_signal_name,
};
use crate::platform::{NamedSignal, SharedRegion, ShmRegion, ShmSignal};
use crate::segment::{ChunkArena, SegmentHeader, SegmentLayout, read_header};
use common::config::ChannelConfig;
use common::consts::{DEFAULT_READER_COUNT, MAX_READERS};
use tracing::{debug, info};

/// Writer-side cursor
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WriteCursor {
    /// Chunk currently appended to
    pub chunk: u32,
    /// Rotated into `chunk` but not yet reset it for a new lap
    pub reset_pending: bool,
    /// `mark_complete` was called
    pub completed: bool,
}

/// Reader-side cursor
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ReadCursor {
    /// Reader slot (bit in the pending mask)
    pub reader: u32,
    /// Chunk currently consumed
    pub chunk: u32,
    /// Bytes of `chunk` already consumed
    pub offset: u32,
}

/// The OS objects a handle holds while attached
pub(crate) struct Attachment {
    pub name: String,
    pub layout: SegmentLayout,
    pub reader_count: u32,
    region: ShmRegion,
    pub reader_event: ShmSignal,
    pub writer_event: ShmSignal,
}

impl Attachment {
    /// Typed view over the mapped segment
    pub fn arena(&self) -> ChunkArena<'_> {
        // SAFETY: `layout` was validated against the mapping's length and the
        // mapping lives as long as `self`.
        unsafe { ChunkArena::new(self.region.base(), self.layout) }
    }

    /// Pending mask a freshly reset chunk starts with
    pub fn initial_reader_mask(&self) -> u32 {
        reader_mask(self.reader_count)
    }
}

fn reader_mask(reader_count: u32) -> u32 {
    ((1u64 << reader_count) - 1) as u32
}

fn validate_reader_count(count: u32) -> StreamResult<()> {
    if count == 0 || count > MAX_READERS {
        return Err(StreamError::InvalidReaderCount { count });
    }
    Ok(())
}

/// One process's handle on a shared chunked byte stream
///
/// A handle is used from one side: the single writer calls the write-side
/// operations, each reader calls the read-side operations for its own reader
/// slot. Both sides may live in the same process on different handles.
///
/// Dropping the handle closes it. The creating handle removes the object
/// names on close; mappings other handles already hold stay valid.
#[derive(Default)]
pub struct Channel {
    pub(crate) attachment: Option<Attachment>,
    pub(crate) write: WriteCursor,
    pub(crate) read: ReadCursor,
}

impl Channel {
    /// Unattached handle. Every operation on it is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new channel for a single reader.
    ///
    /// A unique base name is generated when `name` is `None`.
    pub fn create_new(name: Option<&str>, chunk_count: u32, chunk_length: u32) -> StreamResult<Self> {
        Self::create_new_with_readers(name, chunk_count, chunk_length, DEFAULT_READER_COUNT)
    }

    /// Create a new channel whose chunks are only reused once all
    /// `reader_count` readers released them.
    pub fn create_new_with_readers(
        name: Option<&str>,
        chunk_count: u32,
        chunk_length: u32,
        reader_count: u32,
    ) -> StreamResult<Self> {
        validate_reader_count(reader_count)?;
        let layout = SegmentLayout::new(chunk_count, chunk_length)?;
        let base = match name {
            Some(name) => {
                validate_base_name(name)?;
                name.to_string()
            }
            None => default_base_name(),
        };

        // Each object removes itself if a later step fails.
        let region = ShmRegion::create(&mapping_name(&base), layout.total_size())?;
        // SAFETY: the region was created with `layout.total_size()` bytes.
        unsafe { ChunkArena::new(region.base(), layout) }.initialize(reader_mask(reader_count));

        let attachment = Attachment {
            reader_event: ShmSignal::create(&reader_signal_name(&base))?,
            writer_event: ShmSignal::create(&writer_signal_name(&base))?,
            name: base,
            layout,
            reader_count,
            region,
        };
        info!(
            name = %attachment.name,
            chunk_count,
            chunk_length,
            reader_count,
            size = layout.total_size(),
            "Created stream channel"
        );

        Ok(Self::attached(attachment))
    }

    /// Create a channel from configuration.
    pub fn create_from_config(config: &ChannelConfig) -> StreamResult<Self> {
        config.validate()?;
        Self::create_new_with_readers(
            config.name.as_deref(),
            config.chunk_count,
            config.chunk_length,
            config.reader_count,
        )
    }

    /// Attach to a channel created for a single reader.
    pub fn open_existing(name: &str) -> StreamResult<Self> {
        Self::open_existing_with_readers(name, DEFAULT_READER_COUNT)
    }

    /// Attach to a channel created for `reader_count` readers.
    ///
    /// The header only records the chunk geometry, so the reader count must
    /// match what the creator used.
    pub fn open_existing_with_readers(name: &str, reader_count: u32) -> StreamResult<Self> {
        validate_reader_count(reader_count)?;
        validate_base_name(name)?;

        let mapping = mapping_name(name);
        let region = ShmRegion::open(&mapping)?;
        if region.len() < std::mem::size_of::<SegmentHeader>() {
            return Err(StreamError::CorruptHeader {
                name: mapping,
                reason: format!("mapping is only {} bytes", region.len()),
            });
        }

        // SAFETY: the mapping holds at least a header.
        let header = unsafe { read_header(region.base()) };
        let layout = SegmentLayout::from_header(&header).map_err(|e| StreamError::CorruptHeader {
            name: mapping.clone(),
            reason: e.to_string(),
        })?;
        if region.len() < layout.total_size() {
            return Err(StreamError::CorruptHeader {
                name: mapping,
                reason: format!(
                    "mapping is {} bytes, header describes {}",
                    region.len(),
                    layout.total_size()
                ),
            });
        }

        let attachment = Attachment {
            reader_event: ShmSignal::open(&reader_signal_name(name))?,
            writer_event: ShmSignal::open(&writer_signal_name(name))?,
            name: name.to_string(),
            layout,
            reader_count,
            region,
        };

        info!(
            name,
            chunk_count = layout.chunk_count(),
            chunk_length = layout.chunk_length(),
            "Opened stream channel"
        );

        Ok(Self::attached(attachment))
    }

    fn attached(attachment: Attachment) -> Self {
        Self {
            attachment: Some(attachment),
            write: WriteCursor::default(),
            read: ReadCursor::default(),
        }
    }

    /// Release the mapping and both signals and reset every cursor.
    ///
    /// Closing twice, or closing a handle that never attached, does nothing.
    pub fn close(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            debug!(
                name = %attachment.name,
                owner = attachment.region.is_owner(),
                "Closing stream channel"
            );
        }
        self.write = WriteCursor::default();
        self.read = ReadCursor::default();
    }

    /// Use reader slot `index` for every read-side operation.
    ///
    /// Call before the first read; slots default to 0.
    pub fn select_reader(&mut self, index: u32) -> StreamResult<()> {
        let reader_count = self.reader_count();
        if index >= reader_count {
            return Err(StreamError::InvalidReaderIndex {
                index,
                reader_count,
            });
        }
        debug_assert!(
            self.read.chunk == 0 && self.read.offset == 0,
            "reader slot changed after reading started"
        );
        self.read.reader = index;
        Ok(())
    }

    /// Base name, while attached
    pub fn name(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.name.as_str())
    }

    /// Whether the handle holds its OS objects
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Whether this handle created the channel
    pub fn is_owner(&self) -> bool {
        self.attachment
            .as_ref()
            .is_some_and(|a| a.region.is_owner())
    }

    /// Number of chunks in the ring (0 when unattached)
    pub fn chunk_count(&self) -> u32 {
        self.attachment
            .as_ref()
            .map_or(0, |a| a.layout.chunk_count())
    }

    /// Capacity of each chunk in bytes (0 when unattached)
    pub fn chunk_length(&self) -> u32 {
        self.attachment
            .as_ref()
            .map_or(0, |a| a.layout.chunk_length())
    }

    /// Reader slots chunks wait on (0 when unattached)
    pub fn reader_count(&self) -> u32 {
        self.attachment.as_ref().map_or(0, |a| a.reader_count)
    }

    /// Reader slot this handle reads as
    pub fn reader_index(&self) -> u32 {
        self.read.reader
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name())
            .field("chunk_count", &self.chunk_count())
            .field("chunk_length", &self.chunk_length())
            .field("reader_count", &self.reader_count())
            .field("write", &self.write)
            .field("read", &self.read)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::consts::shm_root;

    fn unique(tag: &str) -> String {
        format!("{tag}_{}", default_base_name())
    }

    #[test]
    fn test_create_and_open() {
        let name = unique("create_open");
        let creator = Channel::create_new(Some(&name), 4, 128).unwrap();
        assert!(creator.is_attached());
        assert!(creator.is_owner());
        assert_eq!(creator.name(), Some(name.as_str()));

        let opener = Channel::open_existing(&name).unwrap();
        assert!(!opener.is_owner());
        assert_eq!(opener.chunk_count(), 4);
        assert_eq!(opener.chunk_length(), 128);
        assert_eq!(opener.reader_count(), 1);
    }

    #[test]
    fn test_generated_name() {
        let channel = Channel::create_new(None, 2, 8).unwrap();
        let name = channel.name().unwrap().to_string();
        assert!(name.contains("COMPUTE_"));
        assert!(Channel::open_existing(&name).is_ok());
    }

    #[test]
    fn test_objects_use_suffixed_names() {
        let name = unique("suffixes");
        let _channel = Channel::create_new(Some(&name), 2, 8).unwrap();
        for object in [
            mapping_name(&name),
            reader_signal_name(&name),
            writer_signal_name(&name),
        ] {
            assert!(shm_root().join(&object).exists(), "{object} missing");
        }
    }

    #[test]
    fn test_creator_close_removes_names() {
        let name = unique("unlink");
        let mut creator = Channel::create_new(Some(&name), 2, 8).unwrap();
        let opener = Channel::open_existing(&name).unwrap();

        creator.close();
        assert!(!shm_root().join(mapping_name(&name)).exists());
        assert!(matches!(
            Channel::open_existing(&name),
            Err(StreamError::NotFound { .. })
        ));

        // The opener's mapping outlives the name
        assert_eq!(opener.chunk_count(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let name = unique("duplicate");
        let _first = Channel::create_new(Some(&name), 2, 8).unwrap();
        assert!(matches!(
            Channel::create_new(Some(&name), 2, 8),
            Err(StreamError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_failed_create_leaves_nothing_behind() {
        let name = unique("rollback");
        // Occupy the writer signal name so the last creation step fails
        let blocker = ShmRegion::create(&writer_signal_name(&name), 64).unwrap();

        assert!(matches!(
            Channel::create_new(Some(&name), 2, 8),
            Err(StreamError::AlreadyExists { .. })
        ));
        assert!(!shm_root().join(mapping_name(&name)).exists());
        assert!(!shm_root().join(reader_signal_name(&name)).exists());
        drop(blocker);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            Channel::create_new(Some("bad/name"), 2, 8),
            Err(StreamError::InvalidName { .. })
        ));
        assert!(matches!(
            Channel::create_new(None, 0, 8),
            Err(StreamError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            Channel::create_new_with_readers(None, 2, 8, 0),
            Err(StreamError::InvalidReaderCount { count: 0 })
        ));
        assert!(matches!(
            Channel::create_new_with_readers(None, 2, 8, MAX_READERS + 1),
            Err(StreamError::InvalidReaderCount { .. })
        ));
    }

    #[test]
    fn test_open_missing() {
        assert!(matches!(
            Channel::open_existing(&unique("missing")),
            Err(StreamError::NotFound { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut never_opened = Channel::new();
        never_opened.close();
        never_opened.close();
        assert!(!never_opened.is_attached());
        assert_eq!(never_opened.chunk_count(), 0);

        let mut channel = Channel::create_new(None, 2, 8).unwrap();
        channel.close();
        channel.close();
        assert!(!channel.is_attached());
        assert_eq!(channel.name(), None);
        assert_eq!(channel.chunk_length(), 0);
        assert_eq!(channel.reader_index(), 0);
    }

    #[test]
    fn test_select_reader_bounds() {
        let name = unique("readers");
        let _creator = Channel::create_new_with_readers(Some(&name), 2, 8, 3).unwrap();
        let mut reader = Channel::open_existing_with_readers(&name, 3).unwrap();
        assert!(reader.select_reader(2).is_ok());
        assert_eq!(reader.reader_index(), 2);
        assert!(matches!(
            reader.select_reader(3),
            Err(StreamError::InvalidReaderIndex { index: 3, reader_count: 3 })
        ));
    }

    #[test]
    fn test_create_from_config() {
        let config = ChannelConfig {
            name: Some(unique("config")),
            chunk_count: 3,
            chunk_length: 32,
            reader_count: 2,
        };
        let channel = Channel::create_from_config(&config).unwrap();
        assert_eq!(channel.chunk_count(), 3);
        assert_eq!(channel.reader_count(), 2);

        let invalid = ChannelConfig {
            chunk_count: 0,
            ..ChannelConfig::default()
        };
        assert!(matches!(
            Channel::create_from_config(&invalid),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_initial_reader_mask() {
        assert_eq!(reader_mask(1), 0b1);
        assert_eq!(reader_mask(3), 0b111);
        assert_eq!(reader_mask(MAX_READERS), 0x7FFF_FFFF);
    }
}
