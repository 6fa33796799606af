//! Delivery sinks.
//!
//! Sinks receive every emitted signal after it is durably stored. A sink
//! failure is the sink's problem: the emitter logs it and moves on, and
//! the store row is never rolled back.

pub mod file;
pub mod http;
pub mod stdout;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Signal;

pub use file::FileSink;
pub use http::HttpSink;
pub use stdout::StdoutSink;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {0}")]
    Status(u16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub trait SignalSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, signal: &Signal) -> Result<(), DeliveryError>;
}
