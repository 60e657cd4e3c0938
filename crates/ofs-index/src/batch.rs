//! Batch writer.
//!
//! # Invariants
//!
//! - **Empty is free**: zero mutations return an empty outcome without a
//!   store round-trip.
//! - **One mutation per key**: a batch naming the same offer twice is
//!   rejected before anything is sent; same-key ordering inside one bulk
//!   request is undefined at the store.
//! - **Nothing dropped**: every failed item comes back with its index,
//!   status, store error and the original mutation.
//! - **No retries**: classification only. Retrying is the caller's policy.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::mutation::Mutation;
use crate::store::{IndexStore, StoreError};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a failed item should be treated by whoever decides on retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Throttling or temporary unavailability; the same document can be
    /// resubmitted unchanged.
    Retryable,
    /// Most likely a mapping/schema problem; the document must be fixed first.
    Permanent,
}

impl FailureClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 | 502 | 503 | 504 => FailureClass::Retryable,
            _ => FailureClass::Permanent,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct FailedMutation {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub status: u16,
    pub class: FailureClass,
    /// Structured error as reported by the store.
    pub error: Value,
    pub mutation: Mutation,
}

impl fmt::Display for FailedMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} offer={} status={} ({:?}): {}",
            self.index,
            self.mutation.op(),
            self.mutation.key(),
            self.status,
            self.class,
            self.error
        )
    }
}

/// Per-item result of one batch.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct BatchOutcome {
    pub submitted: usize,
    /// Indices of items the store accepted.
    pub succeeded: Vec<usize>,
    pub failed: Vec<FailedMutation>,
}

impl BatchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn retryable_only(&self) -> bool {
        self.has_errors()
            && self
                .failed
                .iter()
                .all(|f| f.class == FailureClass::Retryable)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Two mutations target the same key; nothing was sent.
    DuplicateKey { key: String },
    /// The bulk call itself failed (transport, status, decode).
    Store(StoreError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::DuplicateKey { key } => {
                write!(f, "batch contains more than one mutation for offer={key}")
            }
            BatchError::Store(e) => write!(f, "bulk write failed: {e}"),
        }
    }
}

impl std::error::Error for BatchError {}

impl From<StoreError> for BatchError {
    fn from(e: StoreError) -> Self {
        BatchError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Submits typed mutations against one collection as single bulk calls.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn IndexStore>,
    collection: String,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn IndexStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub async fn apply_batch(&self, mutations: Vec<Mutation>) -> Result<BatchOutcome, BatchError> {
        if mutations.is_empty() {
            return Ok(BatchOutcome::empty());
        }

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for m in &mutations {
            if !seen.insert(m.key()) {
                return Err(BatchError::DuplicateKey {
                    key: m.key().to_string(),
                });
            }
        }

        let ops = mutations
            .iter()
            .map(|m| m.to_bulk_op(&self.collection))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            collection = %self.collection,
            count = ops.len(),
            backend = self.store.name(),
            "submitting bulk batch"
        );
        let response = self.store.bulk(&ops).await?;

        if response.items.len() != mutations.len() {
            return Err(BatchError::Store(StoreError::Decode(format!(
                "bulk response has {} items for {} submitted operations",
                response.items.len(),
                mutations.len()
            ))));
        }

        let mut outcome = BatchOutcome {
            submitted: mutations.len(),
            ..BatchOutcome::default()
        };
        // Items come back in request order.
        for (index, (item, mutation)) in response.items.into_iter().zip(mutations).enumerate() {
            match item.error {
                None => outcome.succeeded.push(index),
                Some(error) => outcome.failed.push(FailedMutation {
                    index,
                    status: item.status,
                    class: FailureClass::from_status(item.status),
                    error,
                    mutation,
                }),
            }
        }
        Ok(outcome)
    }
}
