use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ofs_index::{BulkAction, BulkItemResult, BulkOp, BulkResponse, IndexStore, StoreError};
use serde_json::{json, Value};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`IndexStore`].
///
/// Failure injection:
/// - [`fail_item`](Self::fail_item): every bulk item for that id reports the
///   given status with an error object until cleared.
/// - [`fail_next_call`](Self::fail_next_call): the next call of any kind
///   returns the error without touching state.
#[derive(Default)]
pub struct MemoryIndexStore {
    collections: Mutex<Collections>,
    item_failures: Mutex<BTreeMap<String, u16>>,
    next_call_error: Mutex<Option<StoreError>>,
    bulk_calls: AtomicUsize,
    single_calls: AtomicUsize,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, id: &str, doc: Value) {
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    pub fn doc(&self, collection: &str, id: &str) -> Option<Value> {
        lock(&self.collections)
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    pub fn docs(&self, collection: &str) -> BTreeMap<String, Value> {
        lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &str) -> usize {
        lock(&self.collections)
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    pub fn fail_item(&self, id: &str, status: u16) {
        lock(&self.item_failures).insert(id.to_string(), status);
    }

    pub fn fail_next_call(&self, err: StoreError) {
        *lock(&self.next_call_error) = Some(err);
    }

    /// Number of `bulk` calls that reached the store.
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    /// Number of single-document calls (get/upsert/update/delete).
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn round_trips(&self) -> usize {
        self.bulk_calls() + self.single_calls()
    }

    fn begin_single(&self) -> Result<(), StoreError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.next_call_error).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn missing(collection: &str, id: &str) -> Value {
        json!({
            "type": "document_missing_exception",
            "reason": format!("[{id}]: document missing"),
            "index": collection,
        })
    }

    fn apply_op(collections: &mut Collections, op: &BulkOp) -> BulkItemResult {
        let coll = collections.entry(op.collection.clone()).or_default();
        match &op.action {
            BulkAction::Index(doc) => {
                let status = if coll.insert(op.id.clone(), doc.clone()).is_some() {
                    200
                } else {
                    201
                };
                BulkItemResult::ok(status)
            }
            BulkAction::Update(partial) => match coll.get_mut(&op.id) {
                Some(existing) => {
                    merge_into(existing, partial);
                    BulkItemResult::ok(200)
                }
                None => BulkItemResult::failed(404, Self::missing(&op.collection, &op.id)),
            },
            BulkAction::Delete => match coll.remove(&op.id) {
                Some(_) => BulkItemResult::ok(200),
                // absent delete: 404 without an error object
                None => BulkItemResult::ok(404),
            },
        }
    }
}

/// Shallow field merge, matching a partial `_update` with `doc`.
fn merge_into(existing: &mut Value, partial: &Value) {
    match (existing.as_object_mut(), partial.as_object()) {
        (Some(dst), Some(src)) => {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        _ => *existing = partial.clone(),
    }
}

#[async_trait::async_trait]
impl IndexStore for MemoryIndexStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.begin_single()?;
        Ok(self.doc(collection, id))
    }

    async fn upsert(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        self.begin_single()?;
        self.seed(collection, id, doc.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: &Value) -> Result<(), StoreError> {
        self.begin_single()?;
        let mut collections = lock(&self.collections);
        match collections.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(existing) => {
                merge_into(existing, partial);
                Ok(())
            }
            None => Err(StoreError::Status {
                status: 404,
                body: Self::missing(collection, id).to_string(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.begin_single()?;
        if let Some(c) = lock(&self.collections).get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse, StoreError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.next_call_error).take() {
            return Err(err);
        }
        let failures = lock(&self.item_failures).clone();
        let mut collections = lock(&self.collections);
        let items = ops
            .iter()
            .map(|op| match failures.get(&op.id) {
                Some(&status) => BulkItemResult::failed(
                    status,
                    json!({ "type": "injected_failure", "reason": format!("status {status}") }),
                ),
                None => Self::apply_op(&mut collections, op),
            })
            .collect();
        Ok(BulkResponse { items })
    }
}
