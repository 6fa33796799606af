//! Emitter idempotency suite: memory dedup, store dedup, restart
//! recovery, sink isolation, and concurrent writers racing on one store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use signal::delivery::{DeliveryError, SignalSink};
use signal::emitter::{EmitOutcome, SignalEmitter};
use signal::model::{Signal, SignalMetrics, SignalRuntime, SignalState, PROTOCOL_VERSION};
use signal::store::sqlite::SqliteSignalStore;
use signal::store::{SignalStore, StoreError};

struct CountingSink {
    delivered: AtomicUsize,
}

impl CountingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    async fn deliver(&self, _signal: &Signal) -> Result<(), DeliveryError> {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl SignalSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn deliver(&self, _signal: &Signal) -> Result<(), DeliveryError> {
        Err(DeliveryError::Status(503))
    }
}

fn sample_signal(plan_id: &str, timestamp_ms: u64) -> Signal {
    Signal {
        plan_id: plan_id.to_string(),
        state: SignalState::Triggered,
        timestamp_ms,
        runtime: SignalRuntime::default(),
        last_price: 100.7,
        metrics: SignalMetrics::default(),
        strength_score: 65,
        protocol_version: PROTOCOL_VERSION.to_string(),
    }
}

async fn sqlite_store(pool: SqlitePool) -> Arc<SqliteSignalStore> {
    let store = SqliteSignalStore::from_pool(pool);
    store.ensure_schema().await.expect("schema");
    Arc::new(store)
}

#[sqlx::test]
async fn second_emission_is_a_duplicate_with_one_dispatch(pool: SqlitePool) {
    let store = sqlite_store(pool).await;
    let sink = CountingSink::new();
    let emitter = SignalEmitter::new(store.clone(), vec![sink.clone()]);

    let signal = sample_signal("plan-1", 1_000);

    assert_eq!(
        emitter.emit_if_new(&signal).await.unwrap(),
        EmitOutcome::Emitted
    );
    assert_eq!(
        emitter.emit_if_new(&signal).await.unwrap(),
        EmitOutcome::Duplicate
    );

    assert_eq!(sink.count(), 1);
    assert_eq!(store.list_by_plan("plan-1").await.unwrap().len(), 1);
    assert_eq!(store.count_duplicates().await.unwrap(), 0);
}

#[sqlx::test]
async fn restart_recovery_suppresses_replayed_signals(pool: SqlitePool) {
    let store = sqlite_store(pool).await;
    let signal = sample_signal("plan-1", 1_000);

    {
        let emitter = SignalEmitter::new(store.clone(), vec![]);
        emitter.emit_if_new(&signal).await.unwrap();
    }

    // "Restart": fresh emitter seeded from the store.
    let sink = CountingSink::new();
    let emitter = SignalEmitter::with_recovered_keys(store.clone(), vec![sink.clone()])
        .await
        .unwrap();

    assert_eq!(
        emitter.emit_if_new(&signal).await.unwrap(),
        EmitOutcome::Duplicate
    );
    assert_eq!(sink.count(), 0);
}

#[sqlx::test]
async fn sink_failure_does_not_affect_outcome_or_store(pool: SqlitePool) {
    let store = sqlite_store(pool).await;
    let counting = CountingSink::new();
    let emitter = SignalEmitter::new(store.clone(), vec![Arc::new(FailingSink), counting.clone()]);

    let signal = sample_signal("plan-1", 1_000);
    assert_eq!(
        emitter.emit_if_new(&signal).await.unwrap(),
        EmitOutcome::Emitted
    );

    // The failing sink did not stop the later sink nor the store row.
    assert_eq!(counting.count(), 1);
    assert_eq!(store.list_by_plan("plan-1").await.unwrap().len(), 1);
}

#[sqlx::test]
async fn concurrent_workers_produce_one_row_and_one_dispatch(pool: SqlitePool) {
    let store = sqlite_store(pool).await;

    // Two workers with independent dedup caches sharing one store.
    let sink_a = CountingSink::new();
    let sink_b = CountingSink::new();
    let worker_a = Arc::new(SignalEmitter::new(store.clone(), vec![sink_a.clone()]));
    let worker_b = Arc::new(SignalEmitter::new(store.clone(), vec![sink_b.clone()]));

    let signal = sample_signal("plan-1", 1_000);
    let (ra, rb) = tokio::join!(
        {
            let worker = worker_a.clone();
            let signal = signal.clone();
            async move { worker.emit_if_new(&signal).await.unwrap() }
        },
        {
            let worker = worker_b.clone();
            let signal = signal.clone();
            async move { worker.emit_if_new(&signal).await.unwrap() }
        }
    );

    let outcomes = [ra, rb];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == EmitOutcome::Emitted)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == EmitOutcome::Duplicate)
            .count(),
        1
    );

    assert_eq!(store.list_by_plan("plan-1").await.unwrap().len(), 1);
    assert_eq!(store.count_duplicates().await.unwrap(), 0);
    assert_eq!(sink_a.count() + sink_b.count(), 1);
}

/// Store that fails a configurable number of inserts before recovering.
struct FlakyStore {
    inner: Arc<SqliteSignalStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl SignalStore for FlakyStore {
    async fn insert(&self, signal: &Signal) -> Result<(), StoreError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Corrupt("injected failure".into()));
        }
        self.inner.insert(signal).await
    }

    async fn list_by_plan(&self, plan_id: &str) -> Result<Vec<Signal>, StoreError> {
        self.inner.list_by_plan(plan_id).await
    }

    async fn count_duplicates(&self) -> Result<i64, StoreError> {
        self.inner.count_duplicates().await
    }

    async fn load_keys(&self) -> Result<Vec<signal::model::SignalKey>, StoreError> {
        self.inner.load_keys().await
    }
}

#[sqlx::test]
async fn store_failure_refuses_emission_and_allows_retry(pool: SqlitePool) {
    let inner = sqlite_store(pool).await;
    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        failures_left: AtomicUsize::new(1),
    });

    let sink = CountingSink::new();
    let emitter = SignalEmitter::new(flaky, vec![sink.clone()]);
    let signal = sample_signal("plan-1", 1_000);

    // First attempt fails; nothing is cached or dispatched.
    assert!(emitter.emit_if_new(&signal).await.is_err());
    assert_eq!(sink.count(), 0);
    assert!(inner.list_by_plan("plan-1").await.unwrap().is_empty());

    // Retry on the next tick succeeds.
    assert_eq!(
        emitter.emit_if_new(&signal).await.unwrap(),
        EmitOutcome::Emitted
    );
    assert_eq!(sink.count(), 1);
}
