//! Sync engine: bootstrap, phase-ordered replay, live apply/revert.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{select_all, StreamExt};
use ofs_codec::{OfferCodec, PriceUnit};
use ofs_index::{BatchWriter, CheckpointStore, IndexStore, Mutation, MutationOp};
use ofs_ledger::Ledger;
use ofs_schemas::{BlockNumber, EventKind, LedgerEvent, LiveAction, LiveEvent};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::checkpoint::Checkpointer;
use crate::plan::plan_replay;
use crate::{LiveReport, LiveStop, ReplayReport, SyncError, SyncReport, SyncState};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Engine wiring resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub offers_index: String,
    pub checkpoint_index: String,
    pub checkpoint_id: String,
    pub price_unit: PriceUnit,
    /// When true, a failing live handler terminates the session instead of
    /// being logged and skipped.
    pub live_errors_fatal: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offers_index: "offers".to_string(),
            checkpoint_index: "block".to_string(),
            checkpoint_id: "1".to_string(),
            price_unit: PriceUnit::WEI,
            live_errors_fatal: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Live outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveOutcome {
    Applied { kind: EventKind, offer: String },
    Reverted { kind: EventKind, offer: String },
    /// Nothing to write (a change event without data fields).
    Skipped { kind: EventKind, offer: String },
    /// Revert needed a dump and the ledger no longer has the offer; the index
    /// was left as is.
    RecoveryMissing { kind: EventKind, offer: String },
}

fn tally(report: &mut LiveReport, outcome: &LiveOutcome) {
    match outcome {
        LiveOutcome::Applied { .. } => report.applied += 1,
        LiveOutcome::Reverted { .. } => report.reverted += 1,
        LiveOutcome::Skipped { .. } => report.skipped += 1,
        LiveOutcome::RecoveryMissing { .. } => report.recovery_missing += 1,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn IndexStore>,
    writer: BatchWriter,
    checkpoint: Checkpointer,
    codec: OfferCodec,
    offers_index: String,
    live_errors_fatal: bool,
    state: SyncState,
    session_id: Uuid,
}

impl SyncEngine {
    pub fn new(ledger: Arc<dyn Ledger>, store: Arc<dyn IndexStore>, config: EngineConfig) -> Self {
        let checkpoint = Checkpointer::new(CheckpointStore::new(
            Arc::clone(&store),
            config.checkpoint_index,
            config.checkpoint_id,
        ));
        Self {
            writer: BatchWriter::new(Arc::clone(&store), config.offers_index.clone()),
            ledger,
            store,
            checkpoint,
            codec: OfferCodec::new(config.price_unit),
            offers_index: config.offers_index,
            live_errors_fatal: config.live_errors_fatal,
            state: SyncState::Bootstrapping,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// In-memory checkpoint (mirrors the persisted one once bootstrapped).
    pub fn checkpoint(&self) -> Option<BlockNumber> {
        self.checkpoint.current()
    }

    fn require(&self, op: &'static str, expected: SyncState) -> Result<(), SyncError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                op,
                state: self.state.clone(),
            })
        }
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        error!(state = %self.state, error = %err, "sync session failed");
        self.state = SyncState::Failed {
            reason: err.to_string(),
        };
        err
    }

    // -----------------------------------------------------------------------
    // Bootstrapping
    // -----------------------------------------------------------------------

    /// Load the persisted checkpoint. `None` means replay from genesis.
    pub async fn bootstrap(&mut self) -> Result<Option<BlockNumber>, SyncError> {
        self.require("bootstrap", SyncState::Bootstrapping)?;
        match self.checkpoint.load().await {
            Ok(checkpoint) => {
                info!(?checkpoint, "checkpoint loaded");
                self.state = SyncState::Replaying;
                Ok(checkpoint)
            }
            Err(e) => Err(self.fail(SyncError::Checkpoint(e))),
        }
    }

    // -----------------------------------------------------------------------
    // Replaying
    // -----------------------------------------------------------------------

    /// Catch up from the checkpoint to the ledger head. Any failure is
    /// terminal for the session.
    pub async fn replay(&mut self) -> Result<ReplayReport, SyncError> {
        self.require("replay", SyncState::Replaying)?;
        match self.replay_window().await {
            Ok(report) => {
                self.state = SyncState::LiveSyncing;
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn replay_window(&mut self) -> Result<ReplayReport, SyncError> {
        let from = self.checkpoint.current();
        let window = self.ledger.replay(from).await?;
        info!(
            ?from,
            reached = ?window.reached,
            events = window.total_events(),
            "replay window received"
        );

        let plan = plan_replay(&window, &self.codec);
        let mut phases = Vec::with_capacity(plan.batches.len());
        for batch in plan.batches {
            let phase = batch.phase;
            let count = batch.mutations.len();
            phases.push((phase, count));
            if count == 0 {
                debug!(%phase, "RESYNC {phase} skipped (empty)");
                continue;
            }

            info!(%phase, count, "RESYNC {phase}");
            let outcome = self
                .writer
                .apply_batch(batch.mutations)
                .await
                .map_err(|error| SyncError::Batch { phase, error })?;
            if outcome.has_errors() {
                for failed in &outcome.failed {
                    error!(
                        %phase,
                        offer = failed.mutation.key(),
                        status = failed.status,
                        class = ?failed.class,
                        error = %failed.error,
                        "RESYNC item failed"
                    );
                }
                return Err(SyncError::PartialFailure {
                    phase,
                    failed: outcome.failed,
                });
            }
        }

        if let Some(reached) = plan.reached {
            self.checkpoint
                .advance(reached)
                .await
                .map_err(SyncError::Checkpoint)?;
        }

        Ok(ReplayReport {
            from,
            reached: plan.reached,
            phases,
            checkpoint: self.checkpoint.current(),
        })
    }

    // -----------------------------------------------------------------------
    // LiveSyncing
    // -----------------------------------------------------------------------

    /// Handle one live delivery. Applied events advance the checkpoint to
    /// their block; reverts never move it.
    pub async fn apply_event(&mut self, ev: &LiveEvent) -> Result<LiveOutcome, SyncError> {
        self.require("apply_event", SyncState::LiveSyncing)?;
        debug!(
            kind = %ev.event.kind(),
            offer = ev.event.offer(),
            block = ?ev.event.block(),
            action = ?ev.action,
            "live event"
        );

        match ev.action {
            LiveAction::Apply => {
                let outcome = self.apply(&ev.event).await?;
                if let Some(block) = ev.event.block() {
                    self.checkpoint
                        .advance(block)
                        .await
                        .map_err(SyncError::Checkpoint)?;
                }
                Ok(outcome)
            }
            LiveAction::Revert => self.revert(&ev.event).await,
        }
    }

    async fn apply(&self, event: &LedgerEvent) -> Result<LiveOutcome, SyncError> {
        let kind = event.kind();
        let offer = event.offer().to_string();
        let mutation = match event {
            LedgerEvent::Created(e) => Mutation::Upsert(self.codec.from_created(e)),
            LedgerEvent::Changed(e) => match self.codec.from_changed(e) {
                Some(patch) => Mutation::Patch(patch),
                None => return Ok(LiveOutcome::Skipped { kind, offer }),
            },
            LedgerEvent::Bought(e) => Mutation::Patch(self.codec.from_bought(e)),
            LedgerEvent::BuyerRejected(e) => Mutation::Patch(self.codec.from_buyer_rejected(e)),
            LedgerEvent::Completed(_) | LedgerEvent::Cancelled(_) => Mutation::delete(&offer),
        };
        self.write_one(kind, &mutation).await?;
        Ok(LiveOutcome::Applied { kind, offer })
    }

    async fn revert(&self, event: &LedgerEvent) -> Result<LiveOutcome, SyncError> {
        let kind = event.kind();
        let offer = event.offer().to_string();
        let mutation = match event {
            LedgerEvent::Created(_) => Mutation::delete(&offer),
            LedgerEvent::Bought(e) => Mutation::Patch(self.codec.revert_bought(e)),
            LedgerEvent::BuyerRejected(e) => Mutation::Patch(self.codec.revert_buyer_rejected(e)),
            LedgerEvent::Changed(_) | LedgerEvent::Completed(_) | LedgerEvent::Cancelled(_) => {
                return if self.restore_from_dump(kind, &offer).await? {
                    Ok(LiveOutcome::Reverted { kind, offer })
                } else {
                    Ok(LiveOutcome::RecoveryMissing { kind, offer })
                };
            }
        };
        self.write_one(kind, &mutation).await?;
        Ok(LiveOutcome::Reverted { kind, offer })
    }

    /// Overwrite the indexed offer with the ledger's dumped document, as is.
    /// Returns `false` (and leaves the index alone) if the ledger has no such
    /// offer.
    pub async fn restore_from_dump(&self, kind: EventKind, offer: &str) -> Result<bool, SyncError> {
        let Some(doc) = self.ledger.dump(offer).await? else {
            warn!(%kind, offer, "revert recovery: ledger has no such offer; index left unchanged");
            return Ok(false);
        };
        self.write_one(kind, &Mutation::Upsert(doc)).await?;
        info!(%kind, offer, "revert recovery: offer restored from ledger dump");
        Ok(true)
    }

    async fn write_one(&self, kind: EventKind, mutation: &Mutation) -> Result<(), SyncError> {
        let index = self.offers_index.as_str();
        let key = mutation.key();
        let result = match mutation.payload() {
            Err(e) => Err(e),
            Ok(None) => self.store.delete(index, key).await,
            Ok(Some(body)) if mutation.op() == MutationOp::Upsert => {
                self.store.upsert(index, key, &body).await
            }
            Ok(Some(body)) => self.store.update(index, key, &body).await,
        };
        result.map_err(|error| SyncError::Store {
            kind,
            offer: key.to_string(),
            error,
        })
    }

    /// Subscribe to every variant and process deliveries one at a time until
    /// `shutdown` resolves or every feed closes. An in-flight handler always
    /// finishes before shutdown is observed.
    pub async fn run_live<F>(&mut self, shutdown: F) -> Result<LiveReport, SyncError>
    where
        F: Future<Output = ()>,
    {
        self.require("run_live", SyncState::LiveSyncing)?;

        let mut feeds = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            match self.ledger.subscribe(kind).await {
                Ok(rx) => feeds.push(ReceiverStream::new(rx)),
                Err(e) => return Err(self.fail(SyncError::Ledger(e))),
            }
        }
        info!(feeds = feeds.len(), ledger = self.ledger.name(), "live syncing");

        let mut merged = select_all(feeds);
        let mut report = LiveReport::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested; leaving live sync");
                    report.stop = LiveStop::Shutdown;
                    break;
                }
                next = merged.next() => {
                    let Some(ev) = next else {
                        info!("all live feeds closed");
                        report.stop = LiveStop::FeedsClosed;
                        break;
                    };
                    match self.apply_event(&ev).await {
                        Ok(outcome) => tally(&mut report, &outcome),
                        Err(err) => {
                            // checkpoint io is fatal in every phase
                            if self.live_errors_fatal || matches!(err, SyncError::Checkpoint(_)) {
                                return Err(self.fail(err));
                            }
                            report.failed += 1;
                            error!(
                                kind = %ev.event.kind(),
                                offer = ev.event.offer(),
                                block = ?ev.event.block(),
                                error = %err,
                                "live event failed; continuing"
                            );
                        }
                    }
                }
            }
        }

        self.state = SyncState::Stopped;
        Ok(report)
    }

    /// Full session: bootstrap, replay, then live until `shutdown`.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SyncReport, SyncError>
    where
        F: Future<Output = ()>,
    {
        let span = tracing::info_span!("sync_session", session_id = %self.session_id);
        async {
            info!(
                ledger = self.ledger.name(),
                store = self.store.name(),
                index = %self.offers_index,
                "sync session starting"
            );
            self.bootstrap().await?;
            let replay = self.replay().await?;
            info!(
                mutations = replay.total_mutations(),
                checkpoint = ?replay.checkpoint,
                "replay complete"
            );
            let live = self.run_live(shutdown).await?;
            info!(?live, "sync session stopped");
            Ok::<_, SyncError>(SyncReport {
                session_id: self.session_id.to_string(),
                replay,
                live,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_deployed_indices() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.offers_index, "offers");
        assert_eq!(cfg.checkpoint_index, "block");
        assert_eq!(cfg.checkpoint_id, "1");
        assert_eq!(cfg.price_unit, PriceUnit::WEI);
        assert!(!cfg.live_errors_fatal);
    }

    #[test]
    fn tally_counts_by_outcome() {
        let mut report = LiveReport::default();
        let offer = "0xA".to_string();
        tally(
            &mut report,
            &LiveOutcome::Applied {
                kind: EventKind::Created,
                offer: offer.clone(),
            },
        );
        tally(
            &mut report,
            &LiveOutcome::RecoveryMissing {
                kind: EventKind::Changed,
                offer,
            },
        );
        assert_eq!(report.applied, 1);
        assert_eq!(report.recovery_missing, 1);
        assert_eq!(report.failed, 0);
    }
}
