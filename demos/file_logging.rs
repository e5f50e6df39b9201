//! File logging example
//!
//! Demonstrates durable buffering, resending and a TCP sink that falls back
//! to its durable file while the collector is unreachable.
//!
//! Run with: cargo run --example file_logging

use rust_event_logger::prelude::*;
use rust_event_logger::{error, info, warn};
use std::fs;

fn main() -> Result<()> {
    println!("=== Rust Event Logger - File Logging Example ===\n");

    let dir = std::env::temp_dir().join("rust_event_logger_demo");
    fs::create_dir_all(&dir)?;
    let path = dir.join("application.log");
    let _ = fs::remove_file(&path);

    println!("1. Buffering entries (written every 4 entries):");
    let logger = Logger::new(FileSink::new(&path).with_threshold(4));

    info!(logger, "Application started");
    info!(logger, "Loading configuration from %s", "/etc/app.toml");
    warn!(logger, "Using default settings for %d options", 3);
    for i in 1..=5 {
        info!(logger, "Processing item %d/5", i, Meta::pair("item", i));
    }
    error!(logger, "Failed to load optional plugin", Index::pair("plugin", "thumbnails"));

    let on_disk = fs::read_to_string(&path)?.lines().count();
    println!("   {} entries on disk before flush", on_disk);

    logger.flush()?;
    let on_disk = fs::read_to_string(&path)?.lines().count();
    println!("   {} entries on disk after flush", on_disk);

    println!("\n2. Resending the durable file:");
    logger.resend()?;
    if let Some(metrics) = logger.metrics() {
        println!("   replayed {} entries", metrics.replayed());
    }

    println!("\n3. TCP sink without a collector:");
    let tcp_path = dir.join("tcp-outbox.log");
    let tcp = TcpSink::new("127.0.0.1", 9, &tcp_path);
    println!("   connected: {}", tcp.is_connected());

    let tcp_logger = Logger::new(tcp);
    info!(tcp_logger, "kept until the collector is back");
    tcp_logger.shutdown()?;
    println!("   outbox holds {} entries", fs::read_to_string(&tcp_path)?.lines().count());

    println!("\n=== Example completed successfully! ===");
    println!("Check '{}' for the full log output", path.display());

    Ok(())
}
