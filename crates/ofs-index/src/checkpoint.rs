//! Persisted checkpoint: the last block whose effects are in the index.
//!
//! Stored as a single document `{ "lastBlock": <n>, "updatedAt": <rfc3339> }`
//! at a well-known id in a dedicated collection. The store does not enforce
//! monotonicity; the engine only writes values it has already checked.

use std::sync::Arc;

use ofs_schemas::BlockNumber;
use serde_json::json;

use crate::store::{IndexStore, StoreError};

const LAST_BLOCK_FIELD: &str = "lastBlock";

#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn IndexStore>,
    collection: String,
    id: String,
}

impl CheckpointStore {
    pub fn new(
        store: Arc<dyn IndexStore>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// `Ok(None)` on first run (no document, or no block recorded yet).
    pub async fn read(&self) -> Result<Option<BlockNumber>, StoreError> {
        let Some(doc) = self.store.get(&self.collection, &self.id).await? else {
            return Ok(None);
        };
        match doc.get(LAST_BLOCK_FIELD) {
            None => Ok(None),
            Some(v) if v.is_null() => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                StoreError::Decode(format!(
                    "checkpoint {}/{} has non-integer {LAST_BLOCK_FIELD}: {v}",
                    self.collection, self.id
                ))
            }),
        }
    }

    /// Overwrite the checkpoint document. Upsert (not update) so the first
    /// write works on an empty store.
    pub async fn write(&self, block: BlockNumber) -> Result<(), StoreError> {
        let doc = json!({
            LAST_BLOCK_FIELD: block,
            "updatedAt": chrono::Utc::now().to_rfc3339(),
        });
        self.store.upsert(&self.collection, &self.id, &doc).await
    }
}
