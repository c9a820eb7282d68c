//! Byte-for-byte integrity under arbitrary push sizes and chunk geometries

use common::config::{ChannelConfig, ConfigLoader, StreamConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shm_stream::naming::default_base_name;
use shm_stream::{Channel, StreamResult};
use std::io::{Read, Write};
use std::thread;

/// Write `data` in pushes of the given sizes; a push may straddle chunks.
fn write_in_pushes(writer: &mut Channel, data: &[u8], pushes: &[usize]) {
    let mut offset = 0;
    let mut sizes = pushes.iter().copied().cycle();
    while offset < data.len() {
        let mut remaining = sizes.next().unwrap_or(1).min(data.len() - offset);
        while remaining > 0 {
            let memory = writer.get_write_memory();
            let n = memory.len().min(remaining);
            if n == 0 {
                writer.wait_to_write(0);
                continue;
            }
            memory[..n].copy_from_slice(&data[offset..offset + n]);
            writer.advance_write_position(n);
            offset += n;
            remaining -= n;
        }
    }
    writer.mark_complete();
}

/// Read in bites of at most `bite` bytes until complete.
fn read_in_bites(reader: &mut Channel, bite: usize) -> Vec<u8> {
    let mut received = Vec::new();
    while !reader.is_complete() {
        let available = reader.get_read_memory().map_or(0, <[u8]>::len);
        if available == 0 {
            reader.wait_to_read(0);
            continue;
        }
        let n = available.min(bite);
        if let Some(bytes) = reader.get_read_memory() {
            received.extend_from_slice(&bytes[..n]);
        }
        reader.advance_read_position(n);
    }
    received
}

fn transfer(
    chunk_count: u32,
    chunk_length: u32,
    data: &[u8],
    pushes: &[usize],
    bite: usize,
) -> StreamResult<Vec<u8>> {
    let mut writer = Channel::create_new(None, chunk_count, chunk_length)?;
    let name = writer.name().unwrap_or_default().to_string();
    let mut reader = Channel::open_existing(&name)?;

    let consumer = thread::spawn(move || read_in_bites(&mut reader, bite));
    write_in_pushes(&mut writer, data, pushes);
    Ok(consumer.join().unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_arbitrary_pushes_arrive_intact(
        chunk_count in 1u32..5,
        chunk_length in 1u32..40,
        data in prop::collection::vec(any::<u8>(), 0..2_000),
        pushes in prop::collection::vec(1usize..64, 1..16),
        bite in 1usize..50,
    ) {
        let received = transfer(chunk_count, chunk_length, &data, &pushes, bite).unwrap();
        prop_assert_eq!(received, data);
    }
}

#[test]
fn test_random_geometries_through_io_adapters() {
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for _ in 0..16 {
        let chunk_count = rng.gen_range(1..=6);
        let chunk_length = rng.gen_range(1..=256);
        let readers = rng.gen_range(1..=3);
        let len = rng.gen_range(0..20_000);
        let payload: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();

        let mut writer =
            Channel::create_new_with_readers(None, chunk_count, chunk_length, readers).unwrap();
        let name = writer.name().unwrap().to_string();

        let consumers: Vec<_> = (0..readers)
            .map(|index| {
                let mut reader = Channel::open_existing_with_readers(&name, readers).unwrap();
                reader.select_reader(index).unwrap();
                thread::spawn(move || {
                    let mut received = Vec::new();
                    reader.stream_reader().read_to_end(&mut received).unwrap();
                    received
                })
            })
            .collect();

        let mut sink = writer.stream_writer();
        sink.write_all(&payload).unwrap();
        sink.finish().unwrap();

        for consumer in consumers {
            assert_eq!(
                consumer.join().unwrap(),
                payload,
                "geometry {chunk_count}x{chunk_length}, {readers} readers"
            );
        }
    }
}

#[test]
fn test_channel_from_config_file() {
    let base = format!("config_{}", default_base_name());
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[shared]
log_level = "warn"
service_name = "integrity-test"

[channel]
name = "{base}"
chunk_count = 3
chunk_length = 7
"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = StreamConfig::load(file.path()).unwrap();
    config.validate().unwrap();

    let mut writer = Channel::create_from_config(&config.channel).unwrap();
    assert_eq!(writer.name(), Some(base.as_str()));
    assert_eq!(writer.chunk_count(), 3);
    assert_eq!(writer.chunk_length(), 7);

    let mut reader = Channel::open_existing(&base).unwrap();
    let consumer = thread::spawn(move || read_in_bites(&mut reader, 5));
    write_in_pushes(&mut writer, b"configured channel carries bytes", &[3, 11]);
    assert_eq!(consumer.join().unwrap(), b"configured channel carries bytes");

    let generated = Channel::create_from_config(&ChannelConfig {
        chunk_count: 2,
        chunk_length: 16,
        ..ChannelConfig::default()
    })
    .unwrap();
    assert!(generated.name().is_some_and(|n| n.contains("COMPUTE_")));
}
