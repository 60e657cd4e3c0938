//! Scenario: Checkpoint monotonicity across replay and live.
//!
//! # Invariants under test
//!
//! 1. The stored checkpoint equals the max of every value offered so far.
//! 2. Equal or lower values are silent no-ops and cause no store write.
//! 3. A live event older than the replayed head does not move the checkpoint.
//! 4. Reverts never move the checkpoint.
//! 5. A failed checkpoint write leaves the in-memory value untouched.

use std::sync::Arc;

use ofs_index::{CheckpointStore, StoreError};
use ofs_schemas::{LedgerEvent, LiveEvent, ReplayWindow};
use ofs_sync::{Advance, Checkpointer, EngineConfig, SyncEngine};
use ofs_testkit::{created, MemoryIndexStore, ScriptedLedger};

#[tokio::test]
async fn stored_checkpoint_is_running_max() {
    let store = Arc::new(MemoryIndexStore::new());
    let mut cp = Checkpointer::new(CheckpointStore::new(store.clone(), "block", "1"));
    assert_eq!(cp.load().await.unwrap(), None);

    let mut max = 0;
    for candidate in [5u64, 3, 5, 9, 1, 9, 12] {
        let before = store.round_trips();
        let decision = cp.advance(candidate).await.unwrap();
        max = max.max(candidate);
        assert_eq!(cp.current(), Some(max));
        assert_eq!(store.doc("block", "1").unwrap()["lastBlock"], max);
        if !decision.is_advanced() {
            assert_eq!(store.round_trips(), before, "no-op must not write");
        }
    }
    assert_eq!(cp.current(), Some(12));
}

#[tokio::test]
async fn failed_write_does_not_advance_memory() {
    let store = Arc::new(MemoryIndexStore::new());
    let mut cp = Checkpointer::new(CheckpointStore::new(store.clone(), "block", "1"));
    cp.advance(7).await.unwrap();

    store.fail_next_call(StoreError::Transport("reset".to_string()));
    assert!(cp.advance(8).await.is_err());
    assert_eq!(cp.current(), Some(7));

    assert_eq!(
        cp.advance(8).await.unwrap(),
        Advance::Advanced {
            from: Some(7),
            to: 8
        }
    );
}

#[tokio::test]
async fn live_events_only_move_checkpoint_forward() {
    let ledger = Arc::new(ScriptedLedger::with_window(ReplayWindow {
        reached: Some(100),
        ..ReplayWindow::default()
    }));
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = SyncEngine::new(ledger.clone(), store.clone(), EngineConfig::default());
    engine.bootstrap().await.unwrap();
    engine.replay().await.unwrap();
    assert_eq!(engine.checkpoint(), Some(100));

    // older than the replayed head: applied, checkpoint unchanged
    engine
        .apply_event(&LiveEvent::apply(LedgerEvent::Created(created("0xA", 1, 90))))
        .await
        .unwrap();
    assert!(store.doc("offers", "0xA").is_some());
    assert_eq!(engine.checkpoint(), Some(100));

    engine
        .apply_event(&LiveEvent::apply(LedgerEvent::Created(created("0xB", 1, 101))))
        .await
        .unwrap();
    assert_eq!(engine.checkpoint(), Some(101));

    engine
        .apply_event(&LiveEvent::revert(LedgerEvent::Created(created("0xC", 1, 150))))
        .await
        .unwrap();
    assert_eq!(engine.checkpoint(), Some(101), "reverts never advance");
    assert_eq!(store.doc("block", "1").unwrap()["lastBlock"], 101);
}
