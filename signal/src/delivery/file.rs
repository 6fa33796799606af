//! File sink: appends one JSON line per signal.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::{DeliveryError, SignalSink};
use crate::model::Signal;

pub struct FileSink {
    name: String,
    path: PathBuf,
}

impl FileSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl SignalSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, signal: &Signal) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_vec(signal)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(())
    }
}
