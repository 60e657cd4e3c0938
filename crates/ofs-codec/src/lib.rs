//! ofs-codec
//!
//! Pure translation from ledger events to index documents and patches.
//!
//! It does **not**:
//! - talk to the ledger or the index
//! - consult checkpoint or engine state
//!
//! Prices are converted exactly once, here, from the ledger's native integer
//! unit to the index's canonical decimal.

mod price;

pub use price::{CodecError, PriceUnit};

use ofs_schemas::{
    BoughtEvent, BuyerRejectedEvent, ChangedEvent, CreatedEvent, OfferDocument, OfferPatch,
};

/// Event → document/patch mapping for one native price unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OfferCodec {
    unit: PriceUnit,
}

impl OfferCodec {
    pub fn new(unit: PriceUnit) -> Self {
        Self { unit }
    }

    /// Full document for a newly created offer. Never bought, no buyer.
    pub fn from_created(&self, ev: &CreatedEvent) -> OfferDocument {
        OfferDocument {
            offer: ev.offer.clone(),
            seller: ev.seller.clone(),
            title: ev.title.clone(),
            price: self.unit.to_decimal(ev.price),
            category: ev.category.clone(),
            ships_from: ev.ships_from.clone(),
            bought: false,
            buyer: None,
            attached_files: ev.attached_files.clone(),
        }
    }

    /// Patch carrying only the fields present on the event.
    ///
    /// Returns `None` when the event changes nothing, so callers never submit
    /// a patch whose only content is the `offer` key.
    pub fn from_changed(&self, ev: &ChangedEvent) -> Option<OfferPatch> {
        let patch = OfferPatch {
            offer: ev.offer.clone(),
            title: ev.title.clone(),
            price: ev.price.map(|p| self.unit.to_decimal(p)),
            category: ev.category.clone(),
            ships_from: ev.ships_from.clone(),
            attached_files: ev.attached_files.clone(),
            ..OfferPatch::default()
        };
        patch.has_data_fields().then_some(patch)
    }

    pub fn from_bought(&self, ev: &BoughtEvent) -> OfferPatch {
        bought_patch(&ev.offer, Some(&ev.buyer))
    }

    pub fn from_buyer_rejected(&self, ev: &BuyerRejectedEvent) -> OfferPatch {
        unbought_patch(&ev.offer)
    }

    /// Inverse of [`from_bought`](Self::from_bought).
    pub fn revert_bought(&self, ev: &BoughtEvent) -> OfferPatch {
        unbought_patch(&ev.offer)
    }

    /// Inverse of [`from_buyer_rejected`](Self::from_buyer_rejected): the
    /// rejected buyer (when known) is restored.
    pub fn revert_buyer_rejected(&self, ev: &BuyerRejectedEvent) -> OfferPatch {
        bought_patch(&ev.offer, ev.buyer.as_deref())
    }
}

/// `{bought: true, buyer}`; `buyer` is omitted from the patch if unknown.
pub fn bought_patch(offer: &str, buyer: Option<&str>) -> OfferPatch {
    OfferPatch {
        offer: offer.to_string(),
        bought: Some(true),
        buyer: buyer.map(|b| Some(b.to_string())),
        ..OfferPatch::default()
    }
}

/// `{bought: false, buyer: null}`.
pub fn unbought_patch(offer: &str) -> OfferPatch {
    OfferPatch {
        offer: offer.to_string(),
        bought: Some(false),
        buyer: Some(None),
        ..OfferPatch::default()
    }
}
