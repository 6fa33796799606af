use sqlx::SqlitePool;

use signal::model::{Signal, SignalMetrics, SignalRuntime, SignalState, PROTOCOL_VERSION};
use signal::store::sqlite::SqliteSignalStore;
use signal::store::{SignalStore, StoreError};

fn sample_signal(plan_id: &str, state: SignalState, timestamp_ms: u64) -> Signal {
    Signal {
        plan_id: plan_id.to_string(),
        state,
        timestamp_ms,
        runtime: SignalRuntime {
            armed_at: None,
            triggered_at: None,
            invalid_reason: None,
        },
        last_price: 100.7,
        metrics: SignalMetrics {
            rvol: Some(2.0),
            natr_pct: Some(1.3),
            atr: Some(1.3),
            pinbar: false,
        },
        strength_score: 65,
        protocol_version: PROTOCOL_VERSION.to_string(),
    }
}

async fn store(pool: SqlitePool) -> SqliteSignalStore {
    let store = SqliteSignalStore::from_pool(pool);
    store.ensure_schema().await.expect("schema");
    store
}

#[sqlx::test]
async fn insert_and_list_round_trip(pool: SqlitePool) {
    let store = store(pool).await;

    let signal = sample_signal("plan-1", SignalState::Triggered, 1_000);
    store.insert(&signal).await.unwrap();

    let loaded = store.list_by_plan("plan-1").await.unwrap();
    assert_eq!(loaded, vec![signal]);
}

#[sqlx::test]
async fn duplicate_key_is_rejected(pool: SqlitePool) {
    let store = store(pool).await;

    let signal = sample_signal("plan-1", SignalState::Triggered, 1_000);
    store.insert(&signal).await.unwrap();

    let err = store.insert(&signal).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey));

    // Exactly one row survives.
    assert_eq!(store.list_by_plan("plan-1").await.unwrap().len(), 1);
    assert_eq!(store.count_duplicates().await.unwrap(), 0);
}

#[sqlx::test]
async fn same_plan_different_states_coexist(pool: SqlitePool) {
    let store = store(pool).await;

    store
        .insert(&sample_signal("plan-1", SignalState::Triggered, 1_000))
        .await
        .unwrap();
    store
        .insert(&sample_signal("plan-1", SignalState::Invalid, 2_000))
        .await
        .unwrap();

    let loaded = store.list_by_plan("plan-1").await.unwrap();
    assert_eq!(loaded.len(), 2);
    // Ordered by timestamp.
    assert_eq!(loaded[0].state, SignalState::Triggered);
    assert_eq!(loaded[1].state, SignalState::Invalid);
}

#[sqlx::test]
async fn list_is_scoped_to_the_plan(pool: SqlitePool) {
    let store = store(pool).await;

    store
        .insert(&sample_signal("plan-1", SignalState::Expired, 1_000))
        .await
        .unwrap();
    store
        .insert(&sample_signal("plan-2", SignalState::Expired, 1_000))
        .await
        .unwrap();

    assert_eq!(store.list_by_plan("plan-1").await.unwrap().len(), 1);
    assert_eq!(store.list_by_plan("plan-3").await.unwrap().len(), 0);
}

#[sqlx::test]
async fn load_keys_returns_every_stored_triple(pool: SqlitePool) {
    let store = store(pool).await;

    store
        .insert(&sample_signal("plan-1", SignalState::Triggered, 1_000))
        .await
        .unwrap();
    store
        .insert(&sample_signal("plan-2", SignalState::Expired, 2_000))
        .await
        .unwrap();

    let mut keys = store.load_keys().await.unwrap();
    keys.sort_by_key(|k| k.timestamp_ms);

    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].plan_id, "plan-1");
    assert_eq!(keys[0].state, SignalState::Triggered);
    assert_eq!(keys[1].plan_id, "plan-2");
    assert_eq!(keys[1].timestamp_ms, 2_000);
}
