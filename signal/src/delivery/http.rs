//! HTTP webhook sink: POSTs each signal as JSON.

use async_trait::async_trait;

use super::{DeliveryError, SignalSink};
use crate::model::Signal;

pub struct HttpSink {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SignalSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, signal: &Signal) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(signal).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        Ok(())
    }
}
