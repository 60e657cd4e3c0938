//! ofs-ledger
//!
//! Ledger boundary for the offer syncer.
//!
//! This crate defines the [`Ledger`] contract the engine consumes and one
//! concrete adapter, [`GatewayLedger`], which talks to a ledger gateway
//! service over HTTP (replay, dump) and WebSocket (live feed). Chain
//! traversal, decoding and finality are the gateway's business.

pub mod gateway;

use std::fmt;

use ofs_schemas::{BlockNumber, EventKind, LiveEvent, OfferDocument, ReplayWindow};
use tokio::sync::mpsc;

pub use gateway::{decode_frame, GatewayLedger};

/// Per-variant live delivery channel. Dropping it deregisters the
/// subscription.
pub type LiveFeed = mpsc::Receiver<LiveEvent>;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network or transport failure.
    Transport(String),
    /// The gateway answered with a non-success status.
    Api { status: u16, message: String },
    /// A payload could not be decoded.
    Decode(String),
    /// A live subscription could not be established.
    Subscribe { kind: EventKind, message: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Transport(msg) => write!(f, "ledger transport error: {msg}"),
            LedgerError::Api { status, message } => {
                write!(f, "ledger api error status={status}: {message}")
            }
            LedgerError::Decode(msg) => write!(f, "ledger decode error: {msg}"),
            LedgerError::Subscribe { kind, message } => {
                write!(f, "ledger subscribe kind={kind} failed: {message}")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Ledger trait
// ---------------------------------------------------------------------------

/// Source-of-truth event ledger.
///
/// Object-safe; the engine holds an `Arc<dyn Ledger>`.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Human-readable name identifying this ledger adapter.
    fn name(&self) -> &'static str;

    /// Every event from `from` (or genesis when `None`) up to the current
    /// head, grouped per variant and fully materialized.
    async fn replay(&self, from: Option<BlockNumber>) -> Result<ReplayWindow, LedgerError>;

    /// Live apply/revert deliveries for one event variant, in ledger order.
    async fn subscribe(&self, kind: EventKind) -> Result<LiveFeed, LedgerError>;

    /// Authoritative current document of one offer, already in index shape;
    /// `Ok(None)` if it no longer exists on the ledger.
    async fn dump(&self, offer: &str) -> Result<Option<OfferDocument>, LedgerError>;
}
