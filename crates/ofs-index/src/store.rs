//! Store contract.
//!
//! Documents are plain JSON objects addressed by `(collection, id)`. Every
//! write must be visible to subsequent reads once the call returns; adapters
//! request a synchronous refresh to guarantee it.

use std::fmt;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network or transport failure.
    Transport(String),
    /// The store answered with a non-success status.
    Status { status: u16, body: String },
    /// A response could not be decoded.
    Decode(String),
    /// A request payload could not be encoded.
    Encode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "index transport error: {msg}"),
            StoreError::Status { status, body } => {
                write!(f, "index store returned status={status}: {body}")
            }
            StoreError::Decode(msg) => write!(f, "index response decode error: {msg}"),
            StoreError::Encode(msg) => write!(f, "index request encode error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Bulk shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Full overwrite (create or replace).
    Index(Value),
    /// Partial merge into an existing document.
    Update(Value),
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index(_) => "index",
            BulkAction::Update(_) => "update",
            BulkAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkOp {
    pub collection: String,
    pub id: String,
    pub action: BulkAction,
}

/// Outcome of one bulk item. An item failed iff `error` is present; a delete
/// of an absent document reports 404 without an error and counts as success.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub status: u16,
    pub error: Option<Value>,
}

impl BulkItemResult {
    pub fn ok(status: u16) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn failed(status: u16, error: Value) -> Self {
        Self {
            status,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Items are in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(BulkItemResult::is_error)
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Key-addressable document store.
///
/// Object-safe so the engine can hold an `Arc<dyn IndexStore>`.
#[async_trait::async_trait]
pub trait IndexStore: Send + Sync {
    /// Human-readable backend name (e.g. `"elasticsearch"`).
    fn name(&self) -> &'static str;

    /// Fetch a document body. `Ok(None)` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create or fully replace a document.
    async fn upsert(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError>;

    /// Merge `partial` into an existing document. Fails if it is absent.
    async fn update(&self, collection: &str, id: &str, partial: &Value) -> Result<(), StoreError>;

    /// Remove a document. Removing an absent document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Submit many operations in one round-trip. A transport-level failure is
    /// an `Err`; per-item failures are reported inside the response.
    async fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse, StoreError>;
}
