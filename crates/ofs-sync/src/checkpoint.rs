//! Checkpoint monotonicity.
//!
//! # Invariants
//!
//! - **Strictly increasing**: a candidate block is accepted only if it is
//!   greater than the last committed one. Equal or lower is a silent no-op.
//! - **Store first**: the persisted document is written before the in-memory
//!   value moves. A failed write leaves both untouched.
//! - **Single writer**: one engine owns one [`Checkpointer`]; no locking.

use ofs_index::{CheckpointStore, StoreError};
use ofs_schemas::BlockNumber;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The checkpoint moved from `from` to `to`.
    Advanced {
        from: Option<BlockNumber>,
        to: BlockNumber,
    },
    /// `got` is not newer than `current`; nothing was written.
    Stale {
        current: BlockNumber,
        got: BlockNumber,
    },
}

impl Advance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Advance::Advanced { .. })
    }
}

// ---------------------------------------------------------------------------
// Tracker (pure)
// ---------------------------------------------------------------------------

/// Last committed block, in memory. No IO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckpointTracker {
    last: Option<BlockNumber>,
}

impl CheckpointTracker {
    pub fn new(last: Option<BlockNumber>) -> Self {
        Self { last }
    }

    pub fn current(&self) -> Option<BlockNumber> {
        self.last
    }

    /// Decide without committing.
    pub fn check(&self, candidate: BlockNumber) -> Advance {
        match self.last {
            Some(current) if candidate <= current => Advance::Stale {
                current,
                got: candidate,
            },
            from => Advance::Advanced {
                from,
                to: candidate,
            },
        }
    }

    /// Decide and commit if newer.
    pub fn accept(&mut self, candidate: BlockNumber) -> Advance {
        let decision = self.check(candidate);
        if decision.is_advanced() {
            self.last = Some(candidate);
        }
        decision
    }
}

// ---------------------------------------------------------------------------
// Checkpointer (tracker + persisted document)
// ---------------------------------------------------------------------------

pub struct Checkpointer {
    tracker: CheckpointTracker,
    store: CheckpointStore,
}

impl Checkpointer {
    pub fn new(store: CheckpointStore) -> Self {
        Self {
            tracker: CheckpointTracker::default(),
            store,
        }
    }

    pub fn current(&self) -> Option<BlockNumber> {
        self.tracker.current()
    }

    /// Read the persisted value and adopt it as the in-memory baseline.
    pub async fn load(&mut self) -> Result<Option<BlockNumber>, StoreError> {
        let persisted = self.store.read().await?;
        self.tracker = CheckpointTracker::new(persisted);
        Ok(persisted)
    }

    pub async fn advance(&mut self, candidate: BlockNumber) -> Result<Advance, StoreError> {
        let decision = self.tracker.check(candidate);
        if let Advance::Stale { current, got } = decision {
            tracing::debug!(current, got, "checkpoint not advanced (not newer)");
            return Ok(decision);
        }
        self.store.write(candidate).await?;
        self.tracker.accept(candidate);
        tracing::debug!(block = candidate, "checkpoint advanced");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_is_always_accepted() {
        let mut t = CheckpointTracker::default();
        assert_eq!(
            t.accept(0),
            Advance::Advanced { from: None, to: 0 }
        );
        assert_eq!(t.current(), Some(0));
    }

    #[test]
    fn equal_and_lower_are_stale() {
        let mut t = CheckpointTracker::new(Some(50));
        assert_eq!(t.accept(50), Advance::Stale { current: 50, got: 50 });
        assert_eq!(t.accept(49), Advance::Stale { current: 50, got: 49 });
        assert_eq!(t.current(), Some(50));
        assert!(t.accept(51).is_advanced());
        assert_eq!(t.current(), Some(51));
    }

    #[test]
    fn check_does_not_commit() {
        let t = CheckpointTracker::new(Some(3));
        assert!(t.check(9).is_advanced());
        assert_eq!(t.current(), Some(3));
    }
}
