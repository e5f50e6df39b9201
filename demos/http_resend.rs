//! HTTP collector example
//!
//! Entries are buffered in a durable file and delivered in batches by
//! `resend`. Undelivered batches stay in the file for the next attempt.
//!
//! Configure with the usual environment variables:
//!
//! ```text
//! EVENT_LOGGER_CLIENT_ID=... EVENT_LOGGER_CLIENT_SECRET=... \
//!     cargo run --example http_resend
//! ```

use rust_event_logger::prelude::*;
use rust_event_logger::{info, notice, SinkKind};

fn main() -> Result<()> {
    println!("=== Rust Event Logger - HTTP Resend Example ===\n");

    let mut config = LoggerConfig::from_env()?;
    if config.path.is_none() {
        config.path = Some(std::env::temp_dir().join("rust_event_logger_http.log"));
    }
    config.sink = SinkKind::Http;
    if config.client_id.is_none() {
        config.client_id = Some("demo-client".to_string());
        config.client_secret = Some("demo-secret".to_string());
    }

    println!("1. Collector endpoint: {}", config.endpoint);
    let logger = Logger::from_config(&config)?;

    let _request = AmbientContext::new()
        .with_host("shop.example")
        .with_method("POST")
        .with_uri("/checkout")
        .with_request_start(chrono::Utc::now())
        .enter();

    info!(logger, "cart validated", Meta::pair("items", 3));
    notice!(logger, "order %s placed", "A-1042", Index::pair("customer", "c-77"));
    logger.flush()?;

    println!("\n2. Delivering buffered entries:");
    logger.resend()?;

    if let Some(metrics) = logger.metrics() {
        println!("   delivered:      {}", metrics.delivered());
        println!("   re-queued:      {}", metrics.requeued());
        println!("   failed batches: {}", metrics.failed_batches());
    }

    println!("\n=== Example completed! ===");

    Ok(())
}
