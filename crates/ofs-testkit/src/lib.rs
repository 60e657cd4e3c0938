//! In-process doubles for the offer syncer's two external boundaries.
//!
//! - [`MemoryIndexStore`]: document-store semantics (update of a missing
//!   document fails, delete of a missing document succeeds) plus per-key
//!   bulk failure injection and round-trip counters.
//! - [`ScriptedLedger`]: canned replay window, dump snapshots and queued
//!   live deliveries.
//!
//! Used by scenario tests across the workspace; never linked into the daemon.

mod ledger;
mod store;

pub use ledger::ScriptedLedger;
pub use store::MemoryIndexStore;

use ofs_schemas::{
    BoughtEvent, BuyerRejectedEvent, CancelledEvent, ChangedEvent, CompletedEvent, CreatedEvent,
    NativePrice, OfferDocument,
};

// ---------------------------------------------------------------------------
// Event builders
// ---------------------------------------------------------------------------

pub fn created(offer: &str, price: u128, block: u64) -> CreatedEvent {
    CreatedEvent {
        offer: offer.to_string(),
        seller: "0xSELLER".to_string(),
        title: format!("offer {offer}"),
        price: NativePrice(price),
        category: "books".to_string(),
        ships_from: "PL".to_string(),
        attached_files: "[]".to_string(),
        block: Some(block),
    }
}

pub fn changed_title(offer: &str, title: &str, block: u64) -> ChangedEvent {
    ChangedEvent {
        offer: offer.to_string(),
        title: Some(title.to_string()),
        block: Some(block),
        ..ChangedEvent::default()
    }
}

pub fn bought(offer: &str, buyer: &str, block: u64) -> BoughtEvent {
    BoughtEvent {
        offer: offer.to_string(),
        buyer: buyer.to_string(),
        block: Some(block),
    }
}

pub fn buyer_rejected(offer: &str, buyer: Option<&str>, block: u64) -> BuyerRejectedEvent {
    BuyerRejectedEvent {
        offer: offer.to_string(),
        buyer: buyer.map(str::to_string),
        block: Some(block),
    }
}

pub fn completed(offer: &str, block: u64) -> CompletedEvent {
    CompletedEvent {
        offer: offer.to_string(),
        block: Some(block),
    }
}

pub fn cancelled(offer: &str, block: u64) -> CancelledEvent {
    CancelledEvent {
        offer: offer.to_string(),
        block: Some(block),
    }
}

/// Dumped document matching [`created`] with the given overrides. `price`
/// is already in index units.
pub fn offer_document(offer: &str, price: f64, bought: bool, buyer: Option<&str>) -> OfferDocument {
    OfferDocument {
        offer: offer.to_string(),
        seller: "0xSELLER".to_string(),
        title: format!("offer {offer}"),
        price,
        category: "books".to_string(),
        ships_from: "PL".to_string(),
        bought,
        buyer: buyer.map(str::to_string),
        attached_files: "[]".to_string(),
    }
}
