//! Basic logger usage example
//!
//! Demonstrates severities, message formatting and layered context.
//!
//! Run with: cargo run --example basic_usage

use rust_event_logger::prelude::*;
use rust_event_logger::{critical, debug, info, notice, warn};
use std::fs;

fn main() -> Result<()> {
    println!("=== Rust Event Logger - Basic Usage Example ===\n");

    let path = std::env::temp_dir().join("rust_event_logger_basic.log");
    let _ = fs::remove_file(&path);

    // Buffer one entry at a time so every call lands in the file
    let logger = Logger::new(FileSink::new(&path).with_threshold(1));

    println!("1. Logging at different severities:");
    debug!(logger, "This is a debug message");
    info!(logger, "This is an informational message");
    notice!(logger, "This is a notice");
    warn!(logger, "This is a warning");
    critical!(logger, "This is a critical message");

    println!("\n2. Formatted messages:");
    info!(logger, "processed %d of %d items in %.2f s", 42, 50, 1.374);
    info!(logger, "user", 17, "signed in");

    println!("\n3. Context layers:");
    logger.persist_context(vec![Index::pair("service", "checkout").into()]);
    {
        let _request = logger.scoped_context(vec![
            Index::pair("request_id", "r-1042").into(),
            Meta::pair("cart_items", 3).into(),
        ]);
        notice!(logger, "order placed", Meta::pair("total_cents", 12_990));
    }
    info!(logger, "request finished");

    println!("\n4. Errors with their cause chain:");
    let cause = CapturedError::new("connection refused");
    let failure = CapturedError::new("payment provider unavailable").caused_by(cause);
    critical!(logger, failure);

    logger.flush()?;

    for line in fs::read_to_string(&path)?.lines() {
        println!("   {}", line);
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
