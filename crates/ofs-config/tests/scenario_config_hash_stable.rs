//! Config hash stability.
//!
//! Invariants under test:
//! - Loading the same layers twice yields the same hash and canonical JSON.
//! - Key order inside YAML does not affect the hash.
//! - Overlay layers change the hash; an empty overlay does not.

use ofs_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
ledger:
  gateway_url: "http://127.0.0.1:8545"
  events_url: "ws://127.0.0.1:8546/events"
  native_decimals: 18
index:
  url: "http://127.0.0.1:9200"
  auth:
    api_key_env: "OFS_INDEX_API_KEY"
"#;

const BASE_YAML_REORDERED: &str = r#"
index:
  auth:
    api_key_env: "OFS_INDEX_API_KEY"
  url: "http://127.0.0.1:9200"
ledger:
  native_decimals: 18
  events_url: "ws://127.0.0.1:8546/events"
  gateway_url: "http://127.0.0.1:8545"
"#;

const OVERLAY_YAML: &str = r#"
index:
  url: "http://search.internal:9200"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "reordered keys must canonicalize to the same hash"
    );
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);
    assert_eq!(
        layered.config_json["index"]["url"],
        "http://search.internal:9200"
    );
    // siblings from the base survive the overlay
    assert_eq!(
        layered.config_json["index"]["auth"]["api_key_env"],
        "OFS_INDEX_API_KEY"
    );
}

#[test]
fn empty_overlay_is_a_no_op() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let with_empty = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();

    assert_eq!(base.config_hash, with_empty.config_hash);
}
