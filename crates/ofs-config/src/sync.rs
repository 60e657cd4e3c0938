//! Typed syncer configuration.
//!
//! ```yaml
//! ledger:
//!   gateway_url: "http://127.0.0.1:8545"
//!   events_url: "ws://127.0.0.1:8546/events"
//!   native_decimals: 18
//! index:
//!   url: "http://127.0.0.1:9200"
//!   offers_index: "offers"
//!   checkpoint_index: "block"
//!   checkpoint_id: "1"
//!   auth:
//!     api_key_env: "OFS_INDEX_API_KEY"
//!     username: "guest"
//!     password_env: "OFS_INDEX_PASSWORD"
//! runtime:
//!   die_on_fail: true
//!   live_errors_fatal: false
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::LoadedConfig;

/// Largest decimal shift a `u128` native price can be scaled by.
const MAX_NATIVE_DECIMALS: u32 = 38;

/// `(env var, what it overrides)`. Applied once, after YAML layering.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OFS_LEDGER_GATEWAY_URL", "ledger.gateway_url"),
    ("OFS_LEDGER_EVENTS_URL", "ledger.events_url"),
    ("OFS_INDEX_URL", "index.url"),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    pub gateway_url: String,
    pub events_url: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexAuthSection {
    /// Env var holding an Elasticsearch API key. Takes precedence over basic
    /// auth when set and non-empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_guest")]
    pub username: String,
    /// Env var holding the basic-auth password. Falls back to `guest`.
    #[serde(default)]
    pub password_env: Option<String>,
}

impl Default for IndexAuthSection {
    fn default() -> Self {
        Self {
            api_key_env: None,
            username: default_guest(),
            password_env: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSection {
    pub url: String,
    #[serde(default = "default_offers_index")]
    pub offers_index: String,
    #[serde(default = "default_checkpoint_index")]
    pub checkpoint_index: String,
    #[serde(default = "default_checkpoint_id")]
    pub checkpoint_id: String,
    #[serde(default)]
    pub auth: IndexAuthSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Exit non-zero after a fatal sync error. When false the process stays
    /// up (idle) until signalled.
    #[serde(default = "default_true")]
    pub die_on_fail: bool,
    #[serde(default)]
    pub live_errors_fatal: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            die_on_fail: true,
            live_errors_fatal: false,
        }
    }
}

/// Immutable syncer configuration. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    pub ledger: LedgerSection,
    pub index: IndexSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

fn default_native_decimals() -> u32 {
    18
}

fn default_guest() -> String {
    "guest".to_string()
}

fn default_offers_index() -> String {
    "offers".to_string()
}

fn default_checkpoint_index() -> String {
    "block".to_string()
}

fn default_checkpoint_id() -> String {
    "1".to_string()
}

fn default_true() -> bool {
    true
}

impl SyncConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg = Self::parse(config_json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn parse(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: sync config")
    }

    /// Typed extraction plus environment overrides, read from the process
    /// environment exactly once.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_loaded_with(loaded, |name| std::env::var(name).ok())
    }

    pub fn from_loaded_with(
        loaded: &LoadedConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut cfg = Self::parse(&loaded.config_json)?;
        cfg.apply_env_overrides(lookup);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, target) in ENV_OVERRIDES {
            let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let slot = match *target {
                "ledger.gateway_url" => &mut self.ledger.gateway_url,
                "ledger.events_url" => &mut self.ledger.events_url,
                "index.url" => &mut self.index.url,
                _ => continue,
            };
            *slot = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("ledger.gateway_url", &self.ledger.gateway_url),
            ("ledger.events_url", &self.ledger.events_url),
            ("index.url", &self.index.url),
            ("index.offers_index", &self.index.offers_index),
            ("index.checkpoint_index", &self.index.checkpoint_index),
            ("index.checkpoint_id", &self.index.checkpoint_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("CONFIG_INVALID: {key} must not be empty");
            }
        }
        if self.ledger.native_decimals > MAX_NATIVE_DECIMALS {
            bail!(
                "CONFIG_INVALID: ledger.native_decimals={} exceeds {MAX_NATIVE_DECIMALS}",
                self.ledger.native_decimals
            );
        }
        if self.index.offers_index == self.index.checkpoint_index {
            bail!(
                "CONFIG_INVALID: offers and checkpoint must live in different indices (both '{}')",
                self.index.offers_index
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "ledger": { "gateway_url": "http://gw", "events_url": "ws://gw/events" },
            "index": { "url": "http://es:9200" }
        })
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg = SyncConfig::from_json(&minimal()).unwrap();
        assert_eq!(cfg.ledger.native_decimals, 18);
        assert_eq!(cfg.index.offers_index, "offers");
        assert_eq!(cfg.index.checkpoint_index, "block");
        assert_eq!(cfg.index.checkpoint_id, "1");
        assert_eq!(cfg.index.auth.username, "guest");
        assert!(cfg.runtime.die_on_fail);
        assert!(!cfg.runtime.live_errors_fatal);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut v = minimal();
        v["index"]["offer_index"] = json!("typo");
        let err = SyncConfig::from_json(&v).unwrap_err();
        assert!(format!("{err:#}").contains("offer_index"));
    }

    #[test]
    fn same_index_for_offers_and_checkpoint_is_invalid() {
        let mut v = minimal();
        v["index"]["checkpoint_index"] = json!("offers");
        assert!(SyncConfig::from_json(&v).is_err());
    }
}
