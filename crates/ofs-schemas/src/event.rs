use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::BlockNumber;

// ---------------------------------------------------------------------------
// NativePrice
// ---------------------------------------------------------------------------

/// Price in the ledger's native (smallest, integer) unit, e.g. wei.
///
/// Serialized as a decimal string so 128-bit values survive JSON transports;
/// plain JSON integers are also accepted on input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NativePrice(pub u128);

impl fmt::Display for NativePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for NativePrice {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NativePrice {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        struct PriceVisitor;

        impl Visitor<'_> for PriceVisitor {
            type Value = NativePrice;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or an integer decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<NativePrice, E> {
                Ok(NativePrice(u128::from(v)))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<NativePrice, E> {
                Ok(NativePrice(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<NativePrice, E> {
                u128::try_from(v)
                    .map(NativePrice)
                    .map_err(|_| E::custom(format!("negative native price: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<NativePrice, E> {
                v.trim()
                    .parse::<u128>()
                    .map(NativePrice)
                    .map_err(|_| E::custom(format!("invalid native price: '{v}'")))
            }
        }

        de.deserialize_any(PriceVisitor)
    }
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub offer: String,
    pub seller: String,
    pub title: String,
    pub price: NativePrice,
    pub category: String,
    pub ships_from: String,
    pub attached_files: String,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

/// Only the fields the seller changed are present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEvent {
    pub offer: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<NativePrice>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub ships_from: Option<String>,
    #[serde(default)]
    pub attached_files: Option<String>,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoughtEvent {
    pub offer: String,
    pub buyer: String,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

/// The seller rejected the current buyer. `buyer` is the rejected buyer when
/// the ledger reports it; it is what a revert restores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerRejectedEvent {
    pub offer: String,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedEvent {
    pub offer: String,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledEvent {
    pub offer: String,
    #[serde(default)]
    pub block: Option<BlockNumber>,
}

// ---------------------------------------------------------------------------
// EventKind / LedgerEvent
// ---------------------------------------------------------------------------

/// Closed set of ledger event variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Changed,
    Bought,
    BuyerRejected,
    Completed,
    Cancelled,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Created,
        EventKind::Changed,
        EventKind::Bought,
        EventKind::BuyerRejected,
        EventKind::Completed,
        EventKind::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Changed => "changed",
            EventKind::Bought => "bought",
            EventKind::BuyerRejected => "buyer_rejected",
            EventKind::Completed => "completed",
            EventKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    Created(CreatedEvent),
    Changed(ChangedEvent),
    Bought(BoughtEvent),
    BuyerRejected(BuyerRejectedEvent),
    Completed(CompletedEvent),
    Cancelled(CancelledEvent),
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::Created(_) => EventKind::Created,
            LedgerEvent::Changed(_) => EventKind::Changed,
            LedgerEvent::Bought(_) => EventKind::Bought,
            LedgerEvent::BuyerRejected(_) => EventKind::BuyerRejected,
            LedgerEvent::Completed(_) => EventKind::Completed,
            LedgerEvent::Cancelled(_) => EventKind::Cancelled,
        }
    }

    pub fn offer(&self) -> &str {
        match self {
            LedgerEvent::Created(e) => &e.offer,
            LedgerEvent::Changed(e) => &e.offer,
            LedgerEvent::Bought(e) => &e.offer,
            LedgerEvent::BuyerRejected(e) => &e.offer,
            LedgerEvent::Completed(e) => &e.offer,
            LedgerEvent::Cancelled(e) => &e.offer,
        }
    }

    pub fn block(&self) -> Option<BlockNumber> {
        match self {
            LedgerEvent::Created(e) => e.block,
            LedgerEvent::Changed(e) => e.block,
            LedgerEvent::Bought(e) => e.block,
            LedgerEvent::BuyerRejected(e) => e.block,
            LedgerEvent::Completed(e) => e.block,
            LedgerEvent::Cancelled(e) => e.block,
        }
    }
}

// ---------------------------------------------------------------------------
// Live delivery
// ---------------------------------------------------------------------------

/// Whether the ledger is delivering an event or retracting one it delivered
/// earlier (chain reorganization).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveAction {
    Apply,
    Revert,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub action: LiveAction,
    pub event: LedgerEvent,
}

impl LiveEvent {
    pub fn apply(event: LedgerEvent) -> Self {
        Self {
            action: LiveAction::Apply,
            event,
        }
    }

    pub fn revert(event: LedgerEvent) -> Self {
        Self {
            action: LiveAction::Revert,
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Replay window / dump snapshot
// ---------------------------------------------------------------------------

/// Everything the ledger reports between a starting block and its head,
/// fully materialized and grouped per variant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayWindow {
    pub created: Vec<CreatedEvent>,
    pub changed: Vec<ChangedEvent>,
    pub bought: Vec<BoughtEvent>,
    pub buyer_rejected: Vec<BuyerRejectedEvent>,
    pub completed: Vec<CompletedEvent>,
    pub cancelled: Vec<CancelledEvent>,
    /// Block the replay reached; `None` if the ledger could not tell.
    pub reached: Option<BlockNumber>,
}

impl ReplayWindow {
    pub fn total_events(&self) -> usize {
        self.created.len()
            + self.changed.len()
            + self.bought.len()
            + self.buyer_rejected.len()
            + self.completed.len()
            + self.cancelled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_price_accepts_string_and_number() {
        let a: NativePrice = serde_json::from_str(r#""1000000000000000000000""#).unwrap();
        assert_eq!(a.0, 1_000_000_000_000_000_000_000);
        let b: NativePrice = serde_json::from_str("100").unwrap();
        assert_eq!(b.0, 100);
        assert!(serde_json::from_str::<NativePrice>(r#""1.5""#).is_err());
        assert!(serde_json::from_str::<NativePrice>("-3").is_err());
    }

    #[test]
    fn live_event_wire_shape() {
        let raw = r#"{
            "action": "revert",
            "event": { "kind": "buyer_rejected", "offer": "0xA", "buyer": "0xB", "block": 12 }
        }"#;
        let ev: LiveEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.action, LiveAction::Revert);
        assert_eq!(ev.event.kind(), EventKind::BuyerRejected);
        assert_eq!(ev.event.offer(), "0xA");
        assert_eq!(ev.event.block(), Some(12));
    }

    #[test]
    fn created_event_price_inside_tagged_enum() {
        let raw = r#"{
            "kind": "created", "offer": "0xA", "seller": "0xS", "title": "Lamp",
            "price": "250", "category": "home", "shipsFrom": "DE", "attachedFiles": "[]"
        }"#;
        let ev: LedgerEvent = serde_json::from_str(raw).unwrap();
        match ev {
            LedgerEvent::Created(c) => {
                assert_eq!(c.price, NativePrice(250));
                assert_eq!(c.block, None);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn replay_window_missing_collections_default_empty() {
        let w: ReplayWindow = serde_json::from_str(r#"{"reached": 7}"#).unwrap();
        assert_eq!(w.total_events(), 0);
        assert_eq!(w.reached, Some(7));
    }
}
