//! Scenario: Elasticsearch adapter speaks the document and bulk APIs.
//!
//! Every write requests `refresh=true`; a missing document reads as `None`;
//! deleting a missing document succeeds; bulk items are failed only when they
//! carry an `error` object.

use httpmock::prelude::*;
use ofs_index::{BulkAction, BulkOp, ElasticAuth, ElasticIndexStore, IndexStore, StoreError};
use serde_json::json;

#[tokio::test]
async fn get_returns_source_or_none() {
    let server = MockServer::start_async().await;
    let found = server
        .mock_async(|when, then| {
            when.method(GET).path("/offers/_doc/0xA");
            then.status(200).json_body(json!({
                "_index": "offers", "_id": "0xA", "found": true,
                "_source": { "offer": "0xA", "bought": false }
            }));
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/offers/_doc/0xB");
            then.status(404)
                .json_body(json!({ "_index": "offers", "_id": "0xB", "found": false }));
        })
        .await;

    let store = ElasticIndexStore::new(server.base_url(), ElasticAuth::None);
    let doc = store.get("offers", "0xA").await.unwrap();
    assert_eq!(doc, Some(json!({ "offer": "0xA", "bought": false })));
    assert_eq!(store.get("offers", "0xB").await.unwrap(), None);

    found.assert_async().await;
    missing.assert_async().await;
}

#[tokio::test]
async fn writes_request_refresh_and_send_auth() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/block/_doc/1")
                .query_param("refresh", "true")
                .header("authorization", "ApiKey a2V5")
                .json_body(json!({ "lastBlock": 7 }));
            then.status(201).json_body(json!({ "result": "created" }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/offers/_update/0xA")
                .query_param("refresh", "true")
                .json_body(json!({ "doc": { "bought": true } }));
            then.status(200).json_body(json!({ "result": "updated" }));
        })
        .await;

    let store = ElasticIndexStore::new(server.base_url(), ElasticAuth::ApiKey("a2V5".to_string()));
    store
        .upsert("block", "1", &json!({ "lastBlock": 7 }))
        .await
        .unwrap();
    store
        .update("offers", "0xA", &json!({ "bought": true }))
        .await
        .unwrap();

    put.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn basic_auth_uses_configured_credentials() {
    let server = MockServer::start_async().await;
    let del = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/offers/_doc/0xA")
                .header("authorization", "Basic Z3Vlc3Q6Z3Vlc3Q=");
            then.status(404).json_body(json!({ "result": "not_found" }));
        })
        .await;

    let store = ElasticIndexStore::new(
        server.base_url(),
        ElasticAuth::Basic {
            username: "guest".to_string(),
            password: "guest".to_string(),
        },
    );
    store.delete("offers", "0xA").await.unwrap();
    del.assert_async().await;
}

#[tokio::test]
async fn update_of_missing_document_is_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/offers/_update/0xZ");
            then.status(404)
                .json_body(json!({ "error": { "type": "document_missing_exception" }, "status": 404 }));
        })
        .await;

    let store = ElasticIndexStore::new(server.base_url(), ElasticAuth::None);
    let err = store
        .update("offers", "0xZ", &json!({ "bought": true }))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 404, .. }));
}

#[tokio::test]
async fn bulk_posts_ndjson_and_decodes_items() {
    let server = MockServer::start_async().await;
    let bulk = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/_bulk")
                .query_param("refresh", "true")
                .header("content-type", "application/x-ndjson")
                .body_contains(r#"{"delete":{"_id":"0xB","_index":"offers"}}"#);
            then.status(200).json_body(json!({
                "took": 3,
                "errors": true,
                "items": [
                    { "index": { "_id": "0xA", "status": 429,
                                 "error": { "type": "es_rejected_execution_exception" } } },
                    { "delete": { "_id": "0xB", "status": 404, "result": "not_found" } }
                ]
            }));
        })
        .await;

    let store = ElasticIndexStore::new(server.base_url(), ElasticAuth::None);
    let resp = store
        .bulk(&[
            BulkOp {
                collection: "offers".to_string(),
                id: "0xA".to_string(),
                action: BulkAction::Index(json!({ "offer": "0xA" })),
            },
            BulkOp {
                collection: "offers".to_string(),
                id: "0xB".to_string(),
                action: BulkAction::Delete,
            },
        ])
        .await
        .unwrap();

    bulk.assert_async().await;
    assert_eq!(resp.items.len(), 2);
    assert!(resp.items[0].is_error());
    assert_eq!(resp.items[0].status, 429);
    assert!(!resp.items[1].is_error());
}

#[tokio::test]
async fn empty_bulk_makes_no_request() {
    let server = MockServer::start_async().await;
    let bulk = server
        .mock_async(|when, then| {
            when.method(POST).path("/_bulk");
            then.status(200).json_body(json!({ "items": [] }));
        })
        .await;

    let store = ElasticIndexStore::new(server.base_url(), ElasticAuth::None);
    let resp = store.bulk(&[]).await.unwrap();
    assert!(resp.items.is_empty());
    bulk.assert_hits_async(0).await;
}
