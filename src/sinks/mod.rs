//! Log sinks
//!
//! Every sink owns a [`DurableBuffer`]: entries that cannot be delivered
//! right away are kept in a newline-delimited JSON file until a resend.

pub mod durable;
pub mod file;
pub mod http;
pub mod null;
pub mod tcp;
pub mod udp;

pub use durable::{replay, Drain, DurableBuffer, DEFAULT_BUFFER_SIZE};
pub use file::FileSink;
#[cfg(feature = "http")]
pub use http::ReqwestTransport;
pub use http::{
    BatchRequest, Credentials, HttpSink, HttpTransport, CONTENT_TYPE, DEFAULT_BATCH_SIZE,
    DEFAULT_ENDPOINT,
};
pub use null::NullSink;
pub use tcp::TcpSink;
pub use udp::UdpSink;
