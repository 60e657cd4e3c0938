//! ofs-daemon library half.
//!
//! Wiring from a resolved [`SyncConfig`] to a running [`SyncEngine`], and the
//! exit policy applied when a session fails. `main.rs` stays thin: it parses
//! arguments, loads config and signals, then hands off to [`start_syncer`].

use std::sync::Arc;

use anyhow::{Context, Result};
use ofs_codec::PriceUnit;
use ofs_config::{ResolvedIndexAuth, SyncConfig};
use ofs_index::{ElasticAuth, ElasticIndexStore, IndexStore};
use ofs_ledger::{GatewayLedger, Ledger};
use ofs_sync::{EngineConfig, SyncEngine, SyncReport};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// What to do after a fatal sync error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitPolicy {
    /// Exit with code 1. When false, stay up (idle) until shutdown so the
    /// failure can be inspected without a restart loop.
    pub die_on_fail: bool,
}

impl ExitPolicy {
    pub fn from_config(cfg: &SyncConfig) -> Self {
        Self {
            die_on_fail: cfg.runtime.die_on_fail,
        }
    }
}

#[derive(Debug)]
pub enum SyncerExit {
    /// Live syncing ended cleanly.
    Stopped(SyncReport),
    /// Session failed and the policy says exit.
    Failed { code: i32, reason: String },
    /// Session failed; the process idled until shutdown.
    FailedStayedAlive { reason: String },
}

impl SyncerExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncerExit::Stopped(_) | SyncerExit::FailedStayedAlive { .. } => 0,
            SyncerExit::Failed { code, .. } => *code,
        }
    }
}

pub fn engine_config(cfg: &SyncConfig) -> Result<EngineConfig> {
    let price_unit = PriceUnit::new(cfg.ledger.native_decimals)
        .map_err(|e| anyhow::anyhow!("CONFIG_INVALID: ledger.native_decimals: {e}"))?;
    Ok(EngineConfig {
        offers_index: cfg.index.offers_index.clone(),
        checkpoint_index: cfg.index.checkpoint_index.clone(),
        checkpoint_id: cfg.index.checkpoint_id.clone(),
        price_unit,
        live_errors_fatal: cfg.runtime.live_errors_fatal,
    })
}

pub fn elastic_auth(auth: ResolvedIndexAuth) -> ElasticAuth {
    match auth {
        ResolvedIndexAuth::ApiKey(key) => ElasticAuth::ApiKey(key),
        ResolvedIndexAuth::Basic { username, password } => ElasticAuth::Basic { username, password },
    }
}

/// Production wiring: Elasticsearch store plus ledger gateway.
pub fn build_engine(cfg: &SyncConfig, auth: ResolvedIndexAuth) -> Result<SyncEngine> {
    let engine_cfg = engine_config(cfg).context("engine config")?;
    let store: Arc<dyn IndexStore> =
        Arc::new(ElasticIndexStore::new(cfg.index.url.clone(), elastic_auth(auth)));
    let ledger: Arc<dyn Ledger> = Arc::new(GatewayLedger::new(
        cfg.ledger.gateway_url.clone(),
        cfg.ledger.events_url.clone(),
    ));
    Ok(SyncEngine::new(ledger, store, engine_cfg))
}

/// Resolves once `true` is published, or when every sender is gone.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Run one sync session to completion and apply `policy` to its outcome.
pub async fn start_syncer(
    engine: &mut SyncEngine,
    policy: ExitPolicy,
    shutdown: watch::Receiver<bool>,
) -> SyncerExit {
    match engine.run(wait_for_shutdown(shutdown.clone())).await {
        Ok(report) => {
            info!(
                session_id = %report.session_id,
                applied = report.live.applied,
                reverted = report.live.reverted,
                failed = report.live.failed,
                "syncer stopped"
            );
            SyncerExit::Stopped(report)
        }
        Err(err) => {
            let reason = err.to_string();
            if policy.die_on_fail {
                error!(error = %reason, "syncer failed; exiting");
                return SyncerExit::Failed { code: 1, reason };
            }
            warn!(error = %reason, "syncer failed; staying alive until shutdown");
            wait_for_shutdown(shutdown).await;
            SyncerExit::FailedStayedAlive { reason }
        }
    }
}
