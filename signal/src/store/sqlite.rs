//! SQLite-backed signal store.
//!
//! Schema is ensured on startup; the UNIQUE index on
//! `(plan_id, state, timestamp_ms)` enforces exactly-once persistence
//! even across processes sharing the database file.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{SignalStore, StoreError};
use crate::model::{Signal, SignalKey};

pub struct SqliteSignalStore {
    pool: SqlitePool,
}

impl SqliteSignalStore {
    /// Wrap an existing pool. Call [`ensure_schema`] before first use.
    ///
    /// [`ensure_schema`]: SqliteSignalStore::ensure_schema
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and ensure the schema exists. `url` follows sqlx
    /// conventions, e.g. `sqlite://signals.db?mode=rwc` or
    /// `sqlite::memory:`.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS signals (
  plan_id TEXT NOT NULL,
  state TEXT NOT NULL,
  timestamp_ms INTEGER NOT NULL,
  payload BLOB NOT NULL,
  UNIQUE(plan_id, state, timestamp_ms)
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_signals_plan ON signals(plan_id);"#)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    async fn insert(&self, signal: &Signal) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(signal)?;

        let result = sqlx::query(
            r#"
            INSERT INTO signals (plan_id, state, timestamp_ms, payload)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&signal.plan_id)
        .bind(signal.state.to_string())
        .bind(signal.timestamp_ms as i64)
        .bind(payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_plan(&self, plan_id: &str) -> Result<Vec<Signal>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM signals
            WHERE plan_id = ?
            ORDER BY timestamp_ms
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        let mut signals = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: Vec<u8> = row.get("payload");
            signals.push(serde_json::from_slice(&payload)?);
        }

        Ok(signals)
    }

    async fn count_duplicates(&self) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM (
              SELECT COUNT(*) AS c FROM signals
              GROUP BY plan_id, state, timestamp_ms
              HAVING c > 1
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n"))
    }

    async fn load_keys(&self) -> Result<Vec<SignalKey>, StoreError> {
        let rows = sqlx::query(r#"SELECT plan_id, state, timestamp_ms FROM signals"#)
            .fetch_all(&self.pool)
            .await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let state_str: String = row.get("state");
            let state = state_str
                .parse()
                .map_err(|e: String| StoreError::Corrupt(e))?;

            keys.push(SignalKey {
                plan_id: row.get("plan_id"),
                state,
                timestamp_ms: row.get::<i64, _>("timestamp_ms") as u64,
            });
        }

        Ok(keys)
    }
}
