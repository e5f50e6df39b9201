//! HTTP collector sink
//!
//! Entries are buffered durably like the file sink. Delivery happens on
//! [`LogSink::resend`], which drains the durable file in batches to the
//! collector and puts back anything that was not confirmed.

use super::durable::DurableBuffer;
use crate::core::{DeliveryError, DeliveryResult, LogSink, Result, SinkMetrics};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Collector endpoint used unless configured otherwise
pub const DEFAULT_ENDPOINT: &str = "https://log.mafia.tools/api/v1/logs";

/// Entries per delivery request
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const CONTENT_TYPE: &str = "application/json-seq";

/// Request timeout of the default transport
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials for the collector
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// One delivery request
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub endpoint: &'a str,
    pub credentials: &'a Credentials,
    /// Entries joined by `\n`
    pub body: &'a str,
    pub entries: usize,
}

/// Issues delivery requests and reports the HTTP status
pub trait HttpTransport: Send {
    fn post(&self, request: &BatchRequest<'_>) -> std::result::Result<u16, DeliveryError>;
}

/// Sink delivering batches to a remote collector
pub struct HttpSink {
    buffer: DurableBuffer,
    transport: Box<dyn HttpTransport>,
    credentials: Credentials,
    endpoint: String,
    batch_size: usize,
}

impl fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSink")
            .field("buffer", &self.buffer)
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl HttpSink {
    /// Sink using the blocking reqwest transport
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    #[cfg(feature = "http")]
    pub fn new(path: impl Into<PathBuf>, credentials: Credentials) -> Result<Self> {
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT)?;
        Ok(Self::with_transport(path, credentials, transport))
    }

    /// Sink using a custom transport
    pub fn with_transport(
        path: impl Into<PathBuf>,
        credentials: Credentials,
        transport: impl HttpTransport + 'static,
    ) -> Self {
        Self {
            buffer: DurableBuffer::new(path),
            transport: Box::new(transport),
            credentials,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the number of entries per request (at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the number of entries buffered in memory before a write
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.buffer = self.buffer.with_threshold(threshold);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn buffer(&self) -> &DurableBuffer {
        &self.buffer
    }

    /// Deliver one batch
    ///
    /// Only a 200 response counts as delivered; the batch is cleared then.
    /// On failure the batch is left untouched.
    pub fn send_batch(&self, batch: &mut Vec<String>) -> DeliveryResult {
        if batch.is_empty() {
            return Ok(());
        }

        let body = batch.join("\n");
        let request = BatchRequest {
            endpoint: &self.endpoint,
            credentials: &self.credentials,
            body: &body,
            entries: batch.len(),
        };

        let outcome = match self.transport.post(&request) {
            Ok(200) => Ok(()),
            Ok(status) => Err(DeliveryError::Status(status)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.buffer.metrics().record_delivered(batch.len());
                batch.clear();
                Ok(())
            }
            Err(e) => {
                self.buffer.metrics().record_failed_batch();
                Err(e)
            }
        }
    }
}

impl LogSink for HttpSink {
    fn send(&mut self, json: &str) -> Result<()> {
        self.buffer.send(json)
    }

    fn flush(&mut self) -> Result<()> {
        self.buffer.flush()
    }

    /// Drain the durable file to the collector
    ///
    /// A failed batch ends delivery for this round: the batch and every
    /// unread entry go back to the durable file. Only storage errors are
    /// returned.
    fn resend(&mut self) -> Result<()> {
        self.buffer.flush()?;

        let Some(mut drain) = self.buffer.detach()? else {
            return Ok(());
        };

        let mut batch: Vec<String> = Vec::with_capacity(self.batch_size);
        let mut replayed = 0;

        let failure = loop {
            let line = match drain.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    requeue(&mut self.buffer, batch.drain(..))?;
                    self.buffer.flush()?;
                    return Err(e);
                }
                None => break self.send_batch(&mut batch).err(),
            };

            replayed += 1;
            batch.push(line);

            if batch.len() >= self.batch_size {
                if let Err(e) = self.send_batch(&mut batch) {
                    break Some(e);
                }
            }
        };
        self.buffer.metrics().record_replayed(replayed);

        if let Some(error) = failure {
            tracing::warn!(
                endpoint = %self.endpoint,
                error = %error,
                "batch delivery failed, re-queuing undelivered entries"
            );

            let mut requeued = requeue(&mut self.buffer, batch.drain(..))?;
            for line in &mut drain {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        self.buffer.flush()?;
                        return Err(e);
                    }
                };
                self.buffer.send(&line)?;
                requeued += 1;
            }

            self.buffer.metrics().record_requeued(requeued);
            self.buffer.flush()?;
        }

        tracing::debug!(
            path = %self.buffer.path().display(),
            replayed,
            delivered = self.buffer.metrics().delivered(),
            "drained durable file to collector"
        );
        drain.complete()
    }

    fn name(&self) -> &str {
        "http"
    }

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        Some(self.buffer.metrics())
    }
}

fn requeue(buffer: &mut DurableBuffer, lines: impl Iterator<Item = String>) -> Result<usize> {
    let mut count = 0;
    for line in lines {
        buffer.send(&line)?;
        count += 1;
    }
    Ok(count)
}

/// Blocking reqwest transport with basic auth
#[cfg(feature = "http")]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::core::LoggerError::config("http transport", e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl HttpTransport for ReqwestTransport {
    fn post(&self, request: &BatchRequest<'_>) -> std::result::Result<u16, DeliveryError> {
        let response = self
            .client
            .post(request.endpoint)
            .basic_auth(&request.credentials.client_id, Some(&request.credentials.client_secret))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(request.body.to_string())
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
