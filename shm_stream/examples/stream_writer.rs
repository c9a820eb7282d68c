//! Writer example: creates a channel and streams numbered lines into it
//!
//! ```text
//! cargo run --example stream_writer -- demo_stream
//! cargo run --example stream_reader -- demo_stream
//! ```

use common::prelude::LogLevel;
use shm_stream::{Channel, StreamResult};
use std::io::{self, Write};

fn main() -> StreamResult<()> {
    shm_stream::init_tracing_with_level(LogLevel::Info);

    println!("Shared Memory Stream Writer Example");
    println!("===================================");

    let name = std::env::args().nth(1).unwrap_or_else(|| "demo_stream".to_string());
    let mut writer = Channel::create_new(Some(&name), 4, 256)?;

    println!("✓ Channel '{}' created", name);
    println!("  Chunks: {} x {} bytes", writer.chunk_count(), writer.chunk_length());

    println!("\nStart the reader, then press Enter to stream...");
    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();

    let mut sink = writer.stream_writer();
    for i in 0..1_000 {
        writeln!(sink, "line {i:04}: the ring rotates every few lines")?;
    }
    sink.finish()?;

    println!("✓ Stream complete");
    println!("\nPress Enter to exit (this removes the channel names)...");
    io::stdin().read_line(&mut input).ok();

    Ok(())
}
