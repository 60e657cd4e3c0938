use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ofs_ledger::{Ledger, LedgerError, LiveFeed};
use ofs_schemas::{BlockNumber, EventKind, LiveEvent, OfferDocument, ReplayWindow};
use tokio::sync::mpsc;

const FEED_CAPACITY: usize = 1024;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted [`Ledger`].
///
/// Live deliveries queued with [`push_live`](Self::push_live) before a
/// subscription are flushed into the feed when it is opened. By default
/// each feed is closed after that flush, so a live loop over a scripted
/// ledger terminates once everything was delivered; call
/// [`hold_feeds_open`](Self::hold_feeds_open) to keep them open until
/// [`close_feeds`](Self::close_feeds).
#[derive(Default)]
pub struct ScriptedLedger {
    window: Mutex<ReplayWindow>,
    replay_error: Mutex<Option<LedgerError>>,
    replay_calls: Mutex<Vec<Option<BlockNumber>>>,
    dumps: Mutex<BTreeMap<String, OfferDocument>>,
    dump_calls: Mutex<Vec<String>>,
    pending: Mutex<BTreeMap<EventKind, Vec<LiveEvent>>>,
    senders: Mutex<BTreeMap<EventKind, mpsc::Sender<LiveEvent>>>,
    subscribe_error: Mutex<Option<LedgerError>>,
    hold_open: Mutex<bool>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: ReplayWindow) -> Self {
        let ledger = Self::new();
        ledger.set_window(window);
        ledger
    }

    /// Every `replay` call returns a clone of this window.
    pub fn set_window(&self, window: ReplayWindow) {
        *lock(&self.window) = window;
    }

    /// The next `replay` call fails with `err`.
    pub fn fail_next_replay(&self, err: LedgerError) {
        *lock(&self.replay_error) = Some(err);
    }

    /// The next `subscribe` call fails with `err`.
    pub fn fail_next_subscribe(&self, err: LedgerError) {
        *lock(&self.subscribe_error) = Some(err);
    }

    /// `from` argument of each `replay` call, in order.
    pub fn replay_calls(&self) -> Vec<Option<BlockNumber>> {
        lock(&self.replay_calls).clone()
    }

    /// `dump` returns a clone of `doc` until replaced.
    pub fn set_dump(&self, doc: OfferDocument) {
        lock(&self.dumps).insert(doc.offer.clone(), doc);
    }

    pub fn dump_calls(&self) -> Vec<String> {
        lock(&self.dump_calls).clone()
    }

    pub fn hold_feeds_open(&self) {
        *lock(&self.hold_open) = true;
    }

    /// Queue a live delivery. Sent immediately if its variant already has an
    /// open feed, otherwise buffered until subscription.
    pub fn push_live(&self, ev: LiveEvent) {
        let kind = ev.event.kind();
        let undelivered = match lock(&self.senders).get(&kind) {
            Some(tx) => tx.try_send(ev).err().map(|e| e.into_inner()),
            None => Some(ev),
        };
        if let Some(ev) = undelivered {
            lock(&self.pending).entry(kind).or_default().push(ev);
        }
    }

    /// Drop every open sender; subscribers observe end of stream.
    pub fn close_feeds(&self) {
        lock(&self.senders).clear();
    }

    pub fn subscribed_kinds(&self) -> Vec<EventKind> {
        lock(&self.senders).keys().copied().collect()
    }
}

#[async_trait::async_trait]
impl Ledger for ScriptedLedger {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn replay(&self, from: Option<BlockNumber>) -> Result<ReplayWindow, LedgerError> {
        lock(&self.replay_calls).push(from);
        if let Some(err) = lock(&self.replay_error).take() {
            return Err(err);
        }
        Ok(lock(&self.window).clone())
    }

    async fn subscribe(&self, kind: EventKind) -> Result<LiveFeed, LedgerError> {
        if let Some(err) = lock(&self.subscribe_error).take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let queued = lock(&self.pending).remove(&kind).unwrap_or_default();
        for ev in queued {
            if tx.try_send(ev).is_err() {
                return Err(LedgerError::Subscribe {
                    kind,
                    message: "scripted feed capacity exceeded".to_string(),
                });
            }
        }
        if *lock(&self.hold_open) {
            lock(&self.senders).insert(kind, tx);
        }
        Ok(rx)
    }

    async fn dump(&self, offer: &str) -> Result<Option<OfferDocument>, LedgerError> {
        lock(&self.dump_calls).push(offer.to_string());
        Ok(lock(&self.dumps).get(offer).cloned())
    }
}
