//! Ledger gateway adapter.
//!
//! # Endpoints
//!
//! | Call        | Request                                   |
//! |-------------|-------------------------------------------|
//! | `replay`    | `GET {gateway}/replay[?fromBlock=N]`      |
//! | `dump`      | `GET {gateway}/offers/{id}` (404 = none)  |
//! | `subscribe` | WebSocket `{events}?kind=<kind>`          |
//!
//! Live frames are JSON [`LiveEvent`] values:
//! `{"action":"apply"|"revert","event":{"kind":"created",...}}`.

use futures_util::StreamExt;
use ofs_schemas::{BlockNumber, EventKind, LiveEvent, OfferDocument, ReplayWindow};
use reqwest::{StatusCode, Url};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{Ledger, LedgerError, LiveFeed};

const LIVE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct GatewayLedger {
    http: reqwest::Client,
    gateway_url: String,
    events_url: String,
}

impl GatewayLedger {
    pub fn new(gateway_url: impl Into<String>, events_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url: gateway_url.into(),
            events_url: events_url.into(),
        }
    }

    fn url(base: &str, segments: &[&str]) -> Result<Url, LedgerError> {
        let mut url = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| LedgerError::Transport(format!("invalid ledger url '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| LedgerError::Transport(format!("ledger url '{base}' cannot be a base")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn events_url_for(&self, kind: EventKind) -> Result<Url, LedgerError> {
        let mut url = Url::parse(&self.events_url).map_err(|e| LedgerError::Subscribe {
            kind,
            message: format!("invalid events url '{}': {e}", self.events_url),
        })?;
        url.query_pairs_mut().append_pair("kind", kind.as_str());
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, LedgerError> {
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))
    }
}

async fn api_error(resp: reqwest::Response) -> LedgerError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    LedgerError::Api { status, message }
}

#[async_trait::async_trait]
impl Ledger for GatewayLedger {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn replay(&self, from: Option<BlockNumber>) -> Result<ReplayWindow, LedgerError> {
        let mut url = Self::url(&self.gateway_url, &["replay"])?;
        if let Some(block) = from {
            url.query_pairs_mut()
                .append_pair("fromBlock", &block.to_string());
        }
        let resp = self.get(url).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        resp.json::<ReplayWindow>()
            .await
            .map_err(|e| LedgerError::Decode(format!("replay window: {e}")))
    }

    async fn subscribe(&self, kind: EventKind) -> Result<LiveFeed, LedgerError> {
        let url = self.events_url_for(kind)?;
        let (mut ws, _resp) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| LedgerError::Subscribe {
                kind,
                message: e.to_string(),
            })?;
        tracing::info!(%kind, url = %url, "live subscription established");

        let (tx, rx) = mpsc::channel(LIVE_FEED_CAPACITY);
        tokio::spawn(async move {
            while let Some(frame) = ws.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::warn!(%kind, "dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!(%kind, error = %e, "live feed transport error");
                        break;
                    }
                };
                match decode_frame(kind, &text) {
                    Ok(Some(ev)) => {
                        if tx.send(ev).await.is_err() {
                            // receiver dropped: caller deregistered
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(%kind, "dropping frame for a different event kind");
                    }
                    Err(e) => tracing::warn!(%kind, error = %e, "dropping undecodable frame"),
                }
            }
            tracing::info!(%kind, "live subscription closed");
        });
        Ok(rx)
    }

    async fn dump(&self, offer: &str) -> Result<Option<OfferDocument>, LedgerError> {
        let url = Self::url(&self.gateway_url, &["offers", offer])?;
        let resp = self.get(url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        resp.json::<OfferDocument>()
            .await
            .map(Some)
            .map_err(|e| LedgerError::Decode(format!("dump offer={offer}: {e}")))
    }
}

/// Decode one live frame. `Ok(None)` if the frame is for another variant
/// than the subscription it arrived on.
pub fn decode_frame(kind: EventKind, text: &str) -> Result<Option<LiveEvent>, LedgerError> {
    let ev: LiveEvent =
        serde_json::from_str(text).map_err(|e| LedgerError::Decode(format!("live frame: {e}")))?;
    if ev.event.kind() != kind {
        return Ok(None);
    }
    Ok(Some(ev))
}
