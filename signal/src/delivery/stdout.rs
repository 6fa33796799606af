//! Stdout sink: prints each signal as a JSON line.

use async_trait::async_trait;

use super::{DeliveryError, SignalSink};
use crate::model::Signal;

pub struct StdoutSink {
    name: String,
}

impl StdoutSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new("stdout")
    }
}

#[async_trait]
impl SignalSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, signal: &Signal) -> Result<(), DeliveryError> {
        println!("{}", serde_json::to_string(signal)?);
        Ok(())
    }
}
