//! ofs-index
//!
//! Index-store boundary for the offer syncer.
//!
//! - [`IndexStore`]: the store contract (single-document ops + bulk).
//! - [`BatchWriter`]: one bulk call per batch, per-item outcome classification.
//! - [`CheckpointStore`]: the last processed block, persisted as one document.
//! - [`ElasticIndexStore`]: Elasticsearch implementation over HTTP.
//!
//! The in-memory store used by tests lives in `ofs-testkit`.

pub mod batch;
pub mod checkpoint;
pub mod elastic;
pub mod mutation;
pub mod store;

pub use batch::{BatchError, BatchOutcome, BatchWriter, FailedMutation, FailureClass};
pub use checkpoint::CheckpointStore;
pub use elastic::{ElasticAuth, ElasticIndexStore};
pub use mutation::{Mutation, MutationOp};
pub use store::{BulkAction, BulkItemResult, BulkOp, BulkResponse, IndexStore, StoreError};
