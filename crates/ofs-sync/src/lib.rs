//! ofs-sync
//!
//! Reconciliation engine: keeps the offers index consistent with the ledger.
//!
//! Session lifecycle:
//!
//! ```text
//! Bootstrapping ──► Replaying ──► LiveSyncing ──► Stopped
//!       │               │              │
//!       └───────────────┴──────────────┴────────► Failed
//! ```
//!
//! `Failed` is terminal. Bootstrap and replay errors always land there; live
//! handler errors only when configured as fatal. There is no automatic
//! restart; the caller decides.

pub mod checkpoint;
pub mod engine;
pub mod plan;

use std::fmt;

use ofs_index::{BatchError, FailedMutation, StoreError};
use ofs_ledger::LedgerError;
use ofs_schemas::{BlockNumber, EventKind};

pub use checkpoint::{Advance, CheckpointTracker, Checkpointer};
pub use engine::{EngineConfig, LiveOutcome, SyncEngine};
pub use plan::{plan_replay, PhaseBatch, ReplayPhase, ReplayPlan};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncState {
    Bootstrapping,
    Replaying,
    LiveSyncing,
    /// Live syncing ended cleanly (shutdown signal or all feeds closed).
    Stopped,
    /// Terminal. `reason` is the rendered error that caused it.
    Failed { reason: String },
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Bootstrapping => "bootstrapping",
            SyncState::Replaying => "replaying",
            SyncState::LiveSyncing => "live_syncing",
            SyncState::Stopped => "stopped",
            SyncState::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncState::Failed { .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Reading or writing the checkpoint document failed.
    Checkpoint(StoreError),
    /// The ledger could not serve a replay, subscription or dump.
    Ledger(LedgerError),
    /// A replay batch could not be submitted at all.
    Batch {
        phase: ReplayPhase,
        error: BatchError,
    },
    /// A replay batch was submitted but some items failed. All of them are
    /// carried here.
    PartialFailure {
        phase: ReplayPhase,
        failed: Vec<FailedMutation>,
    },
    /// A single-document live write failed.
    Store {
        kind: EventKind,
        offer: String,
        error: StoreError,
    },
    /// An operation was called in a state that does not permit it.
    InvalidState {
        op: &'static str,
        state: SyncState,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Checkpoint(e) => write!(f, "checkpoint io failed: {e}"),
            SyncError::Ledger(e) => write!(f, "{e}"),
            SyncError::Batch { phase, error } => write!(f, "RESYNC {phase} failed: {error}"),
            SyncError::PartialFailure { phase, failed } => {
                write!(f, "RESYNC {phase} had {} failed item(s)", failed.len())?;
                if let Some(first) = failed.first() {
                    write!(f, "; first: {first}")?;
                }
                Ok(())
            }
            SyncError::Store { kind, offer, error } => {
                write!(f, "live {kind} offer={offer} write failed: {error}")
            }
            SyncError::InvalidState { op, state } => {
                write!(f, "{op} is not allowed in state {state}")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<LedgerError> for SyncError {
    fn from(e: LedgerError) -> Self {
        SyncError::Ledger(e)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Checkpoint the replay started from (`None` = genesis).
    pub from: Option<BlockNumber>,
    /// Block the ledger reported as reached.
    pub reached: Option<BlockNumber>,
    /// Mutations submitted per phase, in phase order. Skipped (empty)
    /// phases report zero.
    pub phases: Vec<(ReplayPhase, usize)>,
    /// Checkpoint after replay.
    pub checkpoint: Option<BlockNumber>,
}

impl ReplayReport {
    pub fn total_mutations(&self) -> usize {
        self.phases.iter().map(|(_, n)| n).sum()
    }
}

/// Why live syncing returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LiveStop {
    #[default]
    Shutdown,
    /// Every subscription ended.
    FeedsClosed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveReport {
    pub applied: usize,
    pub reverted: usize,
    /// Events that produced no mutation (e.g. a change with no fields).
    pub skipped: usize,
    /// Handler errors that were isolated and logged.
    pub failed: usize,
    /// Reverts whose dump found no entity on the ledger.
    pub recovery_missing: usize,
    pub stop: LiveStop,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub session_id: String,
    pub replay: ReplayReport,
    pub live: LiveReport,
}
