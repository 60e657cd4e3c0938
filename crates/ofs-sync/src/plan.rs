//! Replay planning: one replay window in, five ordered batches out.
//!
//! # Invariants
//!
//! - **Fixed phase order**: created, changed, bought, buyer_rejected, removed.
//!   Later phases observe earlier ones; removal always wins.
//! - **One mutation per key per phase**: repeated creates keep the last one;
//!   repeated patches are merged in ledger order.
//! - **Removed offers are not patched**: changed/bought/buyer_rejected patches
//!   for an offer removed in the same window are dropped. The delete makes
//!   them moot, and on a second replay of the same window the document is
//!   already gone, so the patch would fail.
//! - **Pure**: no IO.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ofs_codec::OfferCodec;
use ofs_index::Mutation;
use ofs_schemas::{BlockNumber, OfferDocument, OfferPatch, ReplayWindow};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReplayPhase {
    Created,
    Changed,
    Bought,
    BuyerRejected,
    /// Completed and cancelled offers.
    Removed,
}

impl ReplayPhase {
    pub const ORDER: [ReplayPhase; 5] = [
        ReplayPhase::Created,
        ReplayPhase::Changed,
        ReplayPhase::Bought,
        ReplayPhase::BuyerRejected,
        ReplayPhase::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayPhase::Created => "created",
            ReplayPhase::Changed => "changed",
            ReplayPhase::Bought => "bought",
            ReplayPhase::BuyerRejected => "buyer_rejected",
            ReplayPhase::Removed => "removed",
        }
    }
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhaseBatch {
    pub phase: ReplayPhase,
    pub mutations: Vec<Mutation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayPlan {
    /// Always five entries, in [`ReplayPhase::ORDER`]. Some may be empty.
    pub batches: Vec<PhaseBatch>,
    pub reached: Option<BlockNumber>,
}

impl ReplayPlan {
    pub fn total_mutations(&self) -> usize {
        self.batches.iter().map(|b| b.mutations.len()).sum()
    }

    pub fn batch(&self, phase: ReplayPhase) -> Option<&PhaseBatch> {
        self.batches.iter().find(|b| b.phase == phase)
    }
}

// ---------------------------------------------------------------------------
// Coalescing
// ---------------------------------------------------------------------------

/// Insertion-ordered accumulator keyed by offer id.
struct Coalesce<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> Coalesce<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }

    fn put_with(&mut self, key: &str, value: T, combine: impl FnOnce(&mut T, T)) {
        match self.items.get_mut(key) {
            Some(existing) => combine(existing, value),
            None => {
                self.order.push(key.to_string());
                self.items.insert(key.to_string(), value);
            }
        }
    }

    fn into_ordered(mut self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|k| self.items.remove(k))
            .collect()
    }
}

fn coalesce_documents(docs: impl IntoIterator<Item = OfferDocument>) -> Vec<Mutation> {
    let mut acc = Coalesce::new();
    for doc in docs {
        let key = doc.offer.clone();
        acc.put_with(&key, doc, |existing, later| *existing = later);
    }
    acc.into_ordered().into_iter().map(Mutation::Upsert).collect()
}

fn coalesce_patches(
    patches: impl IntoIterator<Item = OfferPatch>,
    removed: &BTreeSet<String>,
) -> Vec<Mutation> {
    let mut acc = Coalesce::new();
    for patch in patches {
        if removed.contains(&patch.offer) {
            continue;
        }
        let key = patch.offer.clone();
        acc.put_with(&key, patch, |existing, later| existing.merge(later));
    }
    acc.into_ordered().into_iter().map(Mutation::Patch).collect()
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

pub fn plan_replay(window: &ReplayWindow, codec: &OfferCodec) -> ReplayPlan {
    let removed: BTreeSet<String> = window
        .completed
        .iter()
        .map(|e| e.offer.clone())
        .chain(window.cancelled.iter().map(|e| e.offer.clone()))
        .collect();

    let created = coalesce_documents(window.created.iter().map(|e| codec.from_created(e)));
    let changed = coalesce_patches(
        window.changed.iter().filter_map(|e| codec.from_changed(e)),
        &removed,
    );
    let bought = coalesce_patches(window.bought.iter().map(|e| codec.from_bought(e)), &removed);
    let buyer_rejected = coalesce_patches(
        window
            .buyer_rejected
            .iter()
            .map(|e| codec.from_buyer_rejected(e)),
        &removed,
    );
    let deletes = removed.iter().map(Mutation::delete).collect();

    let batches = ReplayPhase::ORDER
        .into_iter()
        .zip([created, changed, bought, buyer_rejected, deletes])
        .map(|(phase, mutations)| PhaseBatch { phase, mutations })
        .collect();

    ReplayPlan {
        batches,
        reached: window.reached,
    }
}
