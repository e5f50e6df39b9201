//! Logger configuration
//!
//! Settings can come from JSON or from environment variables:
//! - `EVENT_LOGGER_SINK`: `file`, `tcp`, `udp`, `http` or `null` (default: `file`)
//! - `EVENT_LOGGER_PATH`: durable file location
//! - `EVENT_LOGGER_HOST` / `EVENT_LOGGER_PORT`: socket collector address
//! - `EVENT_LOGGER_CLIENT_ID` / `EVENT_LOGGER_CLIENT_SECRET`: HTTP credentials
//! - `EVENT_LOGGER_ENDPOINT`: HTTP collector URL
//! - `EVENT_LOGGER_BUFFER_SIZE`: entries kept in memory (default: 50)
//! - `EVENT_LOGGER_BATCH_SIZE`: entries per HTTP request (default: 100)
//! - `EVENT_LOGGER_TIMEOUT_SECS`: HTTP request timeout (default: 30)

use super::error::{LoggerError, Result};
use super::sink::LogSink;
use crate::sinks::{FileSink, NullSink, TcpSink, UdpSink, DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix of every environment variable read by [`LoggerConfig::from_env`]
pub const ENV_PREFIX: &str = "EVENT_LOGGER_";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Destination kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    File,
    Tcp,
    Udp,
    Http,
    Null,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::File => "file",
            SinkKind::Tcp => "tcp",
            SinkKind::Udp => "udp",
            SinkKind::Http => "http",
            SinkKind::Null => "null",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(SinkKind::File),
            "tcp" => Ok(SinkKind::Tcp),
            "udp" => Ok(SinkKind::Udp),
            "http" => Ok(SinkKind::Http),
            "null" | "dummy" => Ok(SinkKind::Null),
            other => Err(LoggerError::config("sink", format!("unknown sink '{}'", other))),
        }
    }
}

/// Sink selection and its options
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub sink: SinkKind,
    pub path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub endpoint: String,
    pub buffer_size: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("sink", &self.sink)
            .field("path", &self.path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("buffer_size", &self.buffer_size)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            path: None,
            host: None,
            port: None,
            client_id: None,
            client_secret: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LoggerConfig {
    /// Load configuration from `EVENT_LOGGER_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when a numeric variable does not parse
    /// or the sink kind is unknown.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through any variable lookup, keys include the prefix
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(sink) = var("SINK") {
            config.sink = sink.parse()?;
        }
        config.path = var("PATH").map(PathBuf::from);
        config.host = var("HOST");
        config.port = parse_var(&var, "PORT")?;
        config.client_id = var("CLIENT_ID");
        config.client_secret = var("CLIENT_SECRET");
        if let Some(endpoint) = var("ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(size) = parse_var(&var, "BUFFER_SIZE")? {
            config.buffer_size = size;
        }
        if let Some(size) = parse_var(&var, "BATCH_SIZE")? {
            config.batch_size = size;
        }
        if let Some(secs) = parse_var(&var, "TIMEOUT_SECS")? {
            config.timeout_secs = secs;
        }

        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LoggerError::config("logger config", e.to_string()))
    }

    /// Check that the selected sink has everything it needs
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(LoggerError::config("buffer_size", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(LoggerError::config("batch_size", "must be at least 1"));
        }
        if self.sink == SinkKind::Null {
            return Ok(());
        }
        if self.path.is_none() {
            return Err(LoggerError::config(
                self.sink.as_str(),
                "a durable file path is required",
            ));
        }

        match self.sink {
            SinkKind::Tcp | SinkKind::Udp => {
                if self.host.is_none() || self.port.is_none() {
                    return Err(LoggerError::config(self.sink.as_str(), "host and port are required"));
                }
            }
            SinkKind::Http => {
                if self.client_id.is_none() || self.client_secret.is_none() {
                    return Err(LoggerError::config(
                        "http",
                        "client_id and client_secret are required",
                    ));
                }
                if self.timeout_secs == 0 {
                    return Err(LoggerError::config("timeout_secs", "must be at least 1"));
                }
            }
            SinkKind::File | SinkKind::Null => {}
        }

        Ok(())
    }

    /// Validate and construct the configured sink
    pub fn build_sink(&self) -> Result<Box<dyn LogSink>> {
        self.validate()?;

        let path = self.path.clone().unwrap_or_default();
        let host = self.host.as_deref().unwrap_or_default();
        let port = self.port.unwrap_or_default();

        let sink: Box<dyn LogSink> = match self.sink {
            SinkKind::File => Box::new(FileSink::new(path).with_threshold(self.buffer_size)),
            SinkKind::Tcp => Box::new(TcpSink::new(host, port, path).with_threshold(self.buffer_size)),
            SinkKind::Udp => Box::new(UdpSink::new(host, port, path).with_threshold(self.buffer_size)),
            SinkKind::Http => self.build_http_sink(path)?,
            SinkKind::Null => Box::new(NullSink::new()),
        };

        Ok(sink)
    }

    #[cfg(feature = "http")]
    fn build_http_sink(&self, path: PathBuf) -> Result<Box<dyn LogSink>> {
        use crate::sinks::{Credentials, HttpSink, ReqwestTransport};
        use std::time::Duration;

        let credentials = Credentials::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret.clone().unwrap_or_default(),
        );
        let transport = ReqwestTransport::new(Duration::from_secs(self.timeout_secs))?;
        let sink = HttpSink::with_transport(path, credentials, transport)
            .with_endpoint(self.endpoint.clone())
            .with_batch_size(self.batch_size)
            .with_threshold(self.buffer_size);
        Ok(Box::new(sink))
    }

    #[cfg(not(feature = "http"))]
    fn build_http_sink(&self, _path: PathBuf) -> Result<Box<dyn LogSink>> {
        Err(LoggerError::config(
            "http",
            "built without the `http` feature",
        ))
    }
}

fn parse_var<T, V>(var: &V, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value.parse().map(Some).map_err(|_| {
            LoggerError::config(
                format!("{}{}", ENV_PREFIX, name),
                format!("'{}' is not a valid number", value),
            )
        }),
        None => Ok(None),
    }
}
