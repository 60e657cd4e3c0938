//! Elasticsearch-backed [`IndexStore`].
//!
//! Every write passes `refresh=true` so the change is searchable when the
//! call returns. Credentials are resolved by the caller (config layer) and
//! passed in; do not log them.

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::store::{BulkAction, BulkItemResult, BulkOp, BulkResponse, IndexStore, StoreError};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub enum ElasticAuth {
    /// `Authorization: ApiKey <key>`.
    ApiKey(String),
    Basic { username: String, password: String },
    None,
}

impl std::fmt::Debug for ElasticAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElasticAuth::ApiKey(_) => f.write_str("ApiKey(<REDACTED>)"),
            ElasticAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            ElasticAuth::None => f.write_str("None"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ElasticIndexStore {
    http: reqwest::Client,
    base_url: String,
    auth: ElasticAuth,
}

impl ElasticIndexStore {
    pub fn new(base_url: impl Into<String>, auth: ElasticAuth) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth,
        }
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Transport(format!("invalid index url '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport(format!("index url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.auth {
            ElasticAuth::ApiKey(key) => req.header("Authorization", format!("ApiKey {key}")),
            ElasticAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            ElasticAuth::None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<Response, StoreError> {
        req.send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn error_from(resp: Response) -> StoreError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        StoreError::Status { status, body }
    }

    /// Success, or a status error carrying the response body.
    async fn expect_success(resp: Response) -> Result<Response, StoreError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(Self::error_from(resp).await)
        }
    }
}

#[async_trait::async_trait]
impl IndexStore for ElasticIndexStore {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let url = self.url(&[collection, "_doc", id])?;
        let resp = Self::send(self.request(Method::GET, url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::expect_success(resp).await?;
        let body: GetResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("get {collection}/{id}: {e}")))?;
        if !body.found {
            return Ok(None);
        }
        Ok(body.source)
    }

    async fn upsert(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        let url = self.url(&[collection, "_doc", id])?;
        let req = self
            .request(Method::PUT, url)
            .query(&[("refresh", "true")])
            .json(doc);
        Self::expect_success(Self::send(req).await?).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: &Value) -> Result<(), StoreError> {
        let url = self.url(&[collection, "_update", id])?;
        let req = self
            .request(Method::POST, url)
            .query(&[("refresh", "true")])
            .json(&serde_json::json!({ "doc": partial }));
        Self::expect_success(Self::send(req).await?).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.url(&[collection, "_doc", id])?;
        let req = self
            .request(Method::DELETE, url)
            .query(&[("refresh", "true")]);
        let resp = Self::send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(resp).await?;
        Ok(())
    }

    async fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse, StoreError> {
        if ops.is_empty() {
            return Ok(BulkResponse::default());
        }
        let body = encode_bulk_body(ops)?;
        let url = self.url(&["_bulk"])?;
        let req = self
            .request(Method::POST, url)
            .query(&[("refresh", "true")])
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let resp = Self::expect_success(Self::send(req).await?).await?;
        let raw: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("bulk response: {e}")))?;
        decode_bulk_response(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

// ---------------------------------------------------------------------------
// Bulk wire format
// ---------------------------------------------------------------------------

/// NDJSON: one action line per op, followed by a source line for
/// index/update. Trailing newline is required.
pub fn encode_bulk_body(ops: &[BulkOp]) -> Result<String, StoreError> {
    let mut out = String::new();
    for op in ops {
        let mut meta = Map::new();
        meta.insert(
            op.action.as_str().to_string(),
            serde_json::json!({ "_index": op.collection, "_id": op.id }),
        );
        push_line(&mut out, &Value::Object(meta))?;
        match &op.action {
            BulkAction::Index(doc) => push_line(&mut out, doc)?,
            BulkAction::Update(partial) => push_line(&mut out, &serde_json::json!({ "doc": partial }))?,
            BulkAction::Delete => {}
        }
    }
    Ok(out)
}

fn push_line(out: &mut String, v: &Value) -> Result<(), StoreError> {
    let line = serde_json::to_string(v).map_err(|e| StoreError::Encode(e.to_string()))?;
    out.push_str(&line);
    out.push('\n');
    Ok(())
}

/// Each item is `{ "<action>": { "status": n, "error"?: {...}, ... } }`,
/// in request order.
pub fn decode_bulk_response(raw: &Value) -> Result<BulkResponse, StoreError> {
    let items = raw
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("bulk response has no items array".to_string()))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let result = item
            .as_object()
            .and_then(|action| action.values().next())
            .ok_or_else(|| StoreError::Decode(format!("bulk item #{i} is not an action object")))?;
        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .ok_or_else(|| StoreError::Decode(format!("bulk item #{i} has no status")))?;
        out.push(match result.get("error") {
            Some(err) if !err.is_null() => BulkItemResult::failed(status, err.clone()),
            _ => BulkItemResult::ok(status),
        });
    }
    Ok(BulkResponse { items: out })
}
