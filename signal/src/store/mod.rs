//! Durable signal store.
//!
//! Append-only audit log keyed by `(plan_id, state, timestamp_ms)`; the
//! unique index is the single serialization point between concurrent
//! workers.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Signal, SignalKey};

pub use sqlite::SqliteSignalStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The `(plan_id, state, timestamp_ms)` triple already exists.
    #[error("duplicate signal key")]
    DuplicateKey,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt signal row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Insert one signal; `StoreError::DuplicateKey` when the key exists.
    async fn insert(&self, signal: &Signal) -> Result<(), StoreError>;

    /// All signals for a plan, oldest first.
    async fn list_by_plan(&self, plan_id: &str) -> Result<Vec<Signal>, StoreError>;

    /// Number of key groups holding more than one row. Always zero under
    /// correct operation; exercised by tests.
    async fn count_duplicates(&self) -> Result<i64, StoreError>;

    /// Every stored key, for seeding the emitter's dedup set on startup.
    async fn load_keys(&self) -> Result<Vec<SignalKey>, StoreError>;
}
