//! Scenario: Fresh start replays from genesis and persists the reached block.
//!
//! # Invariants under test
//!
//! 1. No checkpoint → replay is requested from genesis (`None`).
//! 2. One Created event at 100 native units (2 decimals) indexes price 1.0,
//!    `bought=false`, `buyer=null`.
//! 3. The checkpoint becomes the reached block (50) in memory and in the store.
//! 4. A restarted session replays from the persisted checkpoint.
//! 5. An empty window never reaches the store's bulk API.

use std::sync::Arc;

use ofs_codec::PriceUnit;
use ofs_schemas::{OfferDocument, ReplayWindow};
use ofs_sync::{EngineConfig, ReplayPhase, SyncEngine, SyncState};
use ofs_testkit::{created, MemoryIndexStore, ScriptedLedger};
use serde_json::Value;

fn engine(ledger: &Arc<ScriptedLedger>, store: &Arc<MemoryIndexStore>) -> SyncEngine {
    SyncEngine::new(
        ledger.clone(),
        store.clone(),
        EngineConfig {
            price_unit: PriceUnit::new(2).unwrap(),
            ..EngineConfig::default()
        },
    )
}

fn offer(store: &MemoryIndexStore, id: &str) -> Option<OfferDocument> {
    store
        .doc("offers", id)
        .map(|v| serde_json::from_value(v).unwrap())
}

#[tokio::test]
async fn fresh_start_indexes_offer_and_persists_checkpoint() {
    let ledger = Arc::new(ScriptedLedger::with_window(ReplayWindow {
        created: vec![created("0xA", 100, 12)],
        reached: Some(50),
        ..ReplayWindow::default()
    }));
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = engine(&ledger, &store);

    assert_eq!(engine.bootstrap().await.unwrap(), None);
    assert_eq!(engine.state(), &SyncState::Replaying);

    let report = engine.replay().await.unwrap();
    assert_eq!(ledger.replay_calls(), vec![None]);
    assert_eq!(report.from, None);
    assert_eq!(report.reached, Some(50));
    assert_eq!(report.checkpoint, Some(50));
    assert_eq!(report.phases[0], (ReplayPhase::Created, 1));
    assert_eq!(report.total_mutations(), 1);
    assert_eq!(engine.state(), &SyncState::LiveSyncing);

    let doc = offer(&store, "0xA").expect("offer must be indexed");
    assert_eq!(doc.offer, "0xA");
    assert_eq!(doc.price, 1.0);
    assert!(!doc.bought);
    assert_eq!(doc.buyer, None);
    assert_eq!(store.len("offers"), 1);

    let raw = store.doc("offers", "0xA").unwrap();
    assert_eq!(raw.get("buyer"), Some(&Value::Null));

    assert_eq!(engine.checkpoint(), Some(50));
    assert_eq!(store.doc("block", "1").unwrap()["lastBlock"], 50);
}

#[tokio::test]
async fn restarted_session_replays_from_persisted_checkpoint() {
    let ledger = Arc::new(ScriptedLedger::with_window(ReplayWindow {
        created: vec![created("0xA", 100, 12)],
        reached: Some(50),
        ..ReplayWindow::default()
    }));
    let store = Arc::new(MemoryIndexStore::new());

    let mut first = engine(&ledger, &store);
    first.bootstrap().await.unwrap();
    first.replay().await.unwrap();

    let mut second = engine(&ledger, &store);
    assert_eq!(second.bootstrap().await.unwrap(), Some(50));
    second.replay().await.unwrap();
    assert_eq!(ledger.replay_calls(), vec![None, Some(50)]);
    assert_eq!(second.checkpoint(), Some(50));
}

#[tokio::test]
async fn empty_window_makes_no_bulk_call() {
    let ledger = Arc::new(ScriptedLedger::new());
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = engine(&ledger, &store);

    engine.bootstrap().await.unwrap();
    let report = engine.replay().await.unwrap();

    assert_eq!(report.total_mutations(), 0);
    assert_eq!(report.checkpoint, None);
    assert_eq!(store.bulk_calls(), 0, "empty phases must be skipped");
    assert!(store.doc("block", "1").is_none());
    assert_eq!(engine.state(), &SyncState::LiveSyncing);
}

#[tokio::test]
async fn replay_before_bootstrap_is_rejected() {
    let ledger = Arc::new(ScriptedLedger::new());
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = engine(&ledger, &store);

    let err = engine.replay().await.unwrap_err();
    assert!(matches!(err, ofs_sync::SyncError::InvalidState { op: "replay", .. }));
    assert_eq!(engine.state(), &SyncState::Bootstrapping);
    assert!(ledger.replay_calls().is_empty());
}
