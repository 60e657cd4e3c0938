//! Scenario: Live loop isolation, shutdown and fatal policy.
//!
//! # Invariants under test
//!
//! 1. A failing live handler is logged and skipped; later events still apply.
//! 2. With live errors configured fatal, the same failure terminates the
//!    session.
//! 3. Closed feeds end live syncing cleanly (`Stopped`).
//! 4. A shutdown signal ends live syncing cleanly after subscribing to every
//!    variant.
//! 5. A subscription failure is terminal.
//! 6. `run` drives bootstrap, replay and live in order.

use std::sync::Arc;

use ofs_ledger::LedgerError;
use ofs_schemas::{EventKind, LedgerEvent, LiveEvent, ReplayWindow};
use ofs_sync::{EngineConfig, LiveStop, SyncEngine, SyncError, SyncState};
use ofs_testkit::{bought, completed, created, MemoryIndexStore, ScriptedLedger};

async fn live_engine(
    ledger: &Arc<ScriptedLedger>,
    store: &Arc<MemoryIndexStore>,
    live_errors_fatal: bool,
) -> SyncEngine {
    let mut engine = SyncEngine::new(
        ledger.clone(),
        store.clone(),
        EngineConfig {
            live_errors_fatal,
            ..EngineConfig::default()
        },
    );
    engine.bootstrap().await.unwrap();
    engine.replay().await.unwrap();
    engine
}

fn queue_mixed(ledger: &ScriptedLedger) {
    // bought for an offer that was never indexed: update of a missing doc
    ledger.push_live(LiveEvent::apply(LedgerEvent::Bought(bought("0xMISSING", "B", 5))));
    ledger.push_live(LiveEvent::apply(LedgerEvent::Created(created("0xA", 1, 6))));
    ledger.push_live(LiveEvent::apply(LedgerEvent::Created(created("0xB", 1, 7))));
}

#[tokio::test]
async fn failing_handler_is_isolated() {
    let ledger = Arc::new(ScriptedLedger::new());
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = live_engine(&ledger, &store, false).await;
    queue_mixed(&ledger);

    let report = engine.run_live(std::future::pending()).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.stop, LiveStop::FeedsClosed);
    assert_eq!(engine.state(), &SyncState::Stopped);
    assert!(store.doc("offers", "0xA").is_some());
    assert!(store.doc("offers", "0xB").is_some());
    assert_eq!(engine.checkpoint(), Some(7));
}

#[tokio::test]
async fn failing_handler_is_fatal_when_configured() {
    let ledger = Arc::new(ScriptedLedger::new());
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = live_engine(&ledger, &store, true).await;
    ledger.push_live(LiveEvent::apply(LedgerEvent::Bought(bought("0xMISSING", "B", 5))));

    let err = engine.run_live(std::future::pending()).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Store {
            kind: EventKind::Bought,
            ..
        }
    ));
    assert!(engine.state().is_failed());
}

#[tokio::test]
async fn shutdown_signal_stops_cleanly() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.hold_feeds_open();
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = live_engine(&ledger, &store, false).await;

    let report = engine.run_live(std::future::ready(())).await.unwrap();
    assert_eq!(report.stop, LiveStop::Shutdown);
    assert_eq!(engine.state(), &SyncState::Stopped);
    assert_eq!(ledger.subscribed_kinds(), EventKind::ALL.to_vec());
}

#[tokio::test]
async fn shutdown_waits_for_signal_while_feeds_are_open() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.hold_feeds_open();
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = live_engine(&ledger, &store, false).await;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let pusher = {
        let ledger = ledger.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            ledger.push_live(LiveEvent::apply(LedgerEvent::Created(created("0xA", 1, 9))));
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let _ = tx.send(());
        }
    };
    let live = engine.run_live(async {
        let _ = rx.await;
    });
    let (report, ()) = tokio::join!(live, pusher);
    let report = report.unwrap();

    assert_eq!(report.stop, LiveStop::Shutdown);
    assert_eq!(report.applied, 1);
    assert!(store.doc("offers", "0xA").is_some());
}

#[tokio::test]
async fn subscription_failure_is_terminal() {
    let ledger = Arc::new(ScriptedLedger::new());
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = live_engine(&ledger, &store, false).await;
    ledger.fail_next_subscribe(LedgerError::Subscribe {
        kind: EventKind::Created,
        message: "refused".to_string(),
    });

    let err = engine.run_live(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, SyncError::Ledger(LedgerError::Subscribe { .. })));
    assert!(engine.state().is_failed());
}

#[tokio::test]
async fn run_drives_the_whole_session() {
    let ledger = Arc::new(ScriptedLedger::with_window(ReplayWindow {
        created: vec![created("0xA", 1, 10), created("0xB", 1, 11)],
        reached: Some(20),
        ..ReplayWindow::default()
    }));
    ledger.push_live(LiveEvent::apply(LedgerEvent::Completed(completed("0xA", 21))));
    let store = Arc::new(MemoryIndexStore::new());
    let mut engine = SyncEngine::new(ledger.clone(), store.clone(), EngineConfig::default());

    let report = engine.run(std::future::pending()).await.unwrap();
    assert_eq!(report.session_id, engine.session_id().to_string());
    assert_eq!(report.replay.checkpoint, Some(20));
    assert_eq!(report.live.applied, 1);
    assert_eq!(report.live.stop, LiveStop::FeedsClosed);
    assert!(store.doc("offers", "0xA").is_none());
    assert!(store.doc("offers", "0xB").is_some());
    assert_eq!(engine.checkpoint(), Some(21));
    assert_eq!(engine.state(), &SyncState::Stopped);
}
