//! Idempotent signal emission.
//!
//! The store is the source of truth: the in-memory key set is only a
//! cache, rebuilt from the store on startup, and a key enters it only
//! once the store has accepted (or already held) the row. A store failure
//! refuses the emission entirely so the caller can retry later.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::delivery::SignalSink;
use crate::model::{Signal, SignalKey};
use crate::store::{SignalStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Emitted,
    Duplicate,
}

pub struct SignalEmitter {
    store: Arc<dyn SignalStore>,
    sinks: Vec<Arc<dyn SignalSink>>,
    seen: Mutex<HashSet<SignalKey>>,
}

impl SignalEmitter {
    pub fn new(store: Arc<dyn SignalStore>, sinks: Vec<Arc<dyn SignalSink>>) -> Self {
        Self {
            store,
            sinks,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Build an emitter whose dedup set is seeded from the store, so
    /// idempotency survives restarts.
    pub async fn with_recovered_keys(
        store: Arc<dyn SignalStore>,
        sinks: Vec<Arc<dyn SignalSink>>,
    ) -> Result<Self, StoreError> {
        let keys = store.load_keys().await?;
        info!(recovered = keys.len(), "seeded emitter dedup set from store");

        let emitter = Self::new(store, sinks);
        emitter.seen.lock().extend(keys);
        Ok(emitter)
    }

    /// Emit a signal exactly once per `(plan_id, state, timestamp_ms)`.
    ///
    /// Order matters: memory check, store insert, then sink dispatch.
    /// Sink failures are logged and never affect the outcome; store
    /// failures (other than the unique constraint) surface to the caller
    /// and nothing is cached, so the emission can be retried.
    pub async fn emit_if_new(&self, signal: &Signal) -> Result<EmitOutcome, StoreError> {
        let key = signal.key();

        if self.seen.lock().contains(&key) {
            debug!(plan_id = %signal.plan_id, state = %signal.state, "duplicate signal (cache)");
            return Ok(EmitOutcome::Duplicate);
        }

        match self.store.insert(signal).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey) => {
                debug!(plan_id = %signal.plan_id, state = %signal.state, "duplicate signal (store)");
                self.seen.lock().insert(key);
                return Ok(EmitOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        self.seen.lock().insert(key);

        for sink in &self.sinks {
            if let Err(error) = sink.deliver(signal).await {
                warn!(
                    sink = sink.name(),
                    plan_id = %signal.plan_id,
                    state = %signal.state,
                    %error,
                    "signal delivery failed"
                );
            }
        }

        info!(
            plan_id = %signal.plan_id,
            state = %signal.state,
            timestamp_ms = signal.timestamp_ms,
            strength_score = signal.strength_score,
            "signal emitted"
        );

        Ok(EmitOutcome::Emitted)
    }
}
