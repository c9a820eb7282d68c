//! Reader example: attaches to a channel and copies it to stdout

use shm_stream::{Channel, StreamResult};
use std::io;

fn main() -> StreamResult<()> {
    shm_stream::init_tracing();

    let name = std::env::args().nth(1).unwrap_or_else(|| "demo_stream".to_string());

    let mut reader = match Channel::open_existing(&name) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("❌ Failed to open channel '{}': {}", name, e);
            eprintln!("\nMake sure to run the writer example first:");
            eprintln!("  cargo run --example stream_writer -- {}", name);
            return Err(e);
        }
    };

    let copied = io::copy(&mut reader.stream_reader(), &mut io::stdout().lock())?;
    eprintln!("✓ Stream complete after {} bytes", copied);

    Ok(())
}
