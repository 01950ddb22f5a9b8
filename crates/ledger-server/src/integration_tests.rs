//! End-to-end tests for the six literal scenarios (spec.md §8), run against
//! an in-process `Router` with an in-memory store and vector index and a
//! stub completion client — no network calls, following
//! `datasynth-server::rest::auth`'s `oneshot` test style.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use ledger_completion::StubCompletionClient;
use ledger_ingest::{Ingestor, ReconciliationQueue};
use ledger_query::QueryPlanner;
use ledger_store::RelationalStore;
use ledger_vector::InMemoryIndex;

use crate::app_state::AppState;
use crate::routes::build_router;

fn test_state(completion: StubCompletionClient) -> AppState {
    let store = RelationalStore::open_in_memory().expect("in-memory store opens");
    let completion = Arc::new(completion);
    let index: Arc<dyn ledger_vector::VectorIndex> = Arc::new(InMemoryIndex::new(completion.clone()));
    let queue = Arc::new(ReconciliationQueue::new());
    let ingestor = Ingestor::new(store.clone(), index.clone(), queue.clone());
    let planner = Arc::new(QueryPlanner::new(store, index.clone(), completion.clone()));
    AppState {
        ingestor,
        planner,
        completion,
        index,
        queue,
    }
}

async fn post_json(router: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

async fn get_json(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

fn scenario_one() -> Value {
    json!({
        "vendor": "REWE",
        "date": "2024-01-15T10:30:00Z",
        "total": "45.67",
        "tax": "7.32",
        "currency": "EUR",
        "items": [
            {"desc": "Brot", "amount": "2.99"},
            {"desc": "Milch", "amount": "1.29"},
            {"desc": "Käse", "amount": "41.39"}
        ]
    })
}

fn scenario_three() -> Value {
    json!({
        "vendor": "Bar",
        "date": "2024-02-01T22:00:00Z",
        "total": "30.00",
        "tax": "4.75",
        "items": [
            {"desc": "Beer", "amount": "5.00"},
            {"desc": "Wine", "amount": "20.00"}
        ]
    })
}

#[tokio::test]
async fn scenario_1_clean_ingest() {
    let state = test_state(StubCompletionClient::default());
    let router = build_router(state.clone());

    let (status, body) = post_json(&router, "/api/ingest", scenario_one()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["flags"]["duplicate"], false);
    assert_eq!(body["flags"]["suspiciousCategory"], false);
    assert_eq!(body["flags"]["missingVat"], false);
    assert_eq!(body["flags"]["mathError"], false);

    let (status, body) = get_json(&router, "/api/receipts?receiptId=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["vendor"], "REWE");

    let hits = state.index.search("Brot", 5, &Default::default()).await.unwrap();
    assert!(hits.iter().any(|h| h.id == 1 && h.score > 0.0));
}

#[tokio::test]
async fn scenario_2_duplicate() {
    let state = test_state(StubCompletionClient::default());
    let router = build_router(state);

    let (_, first) = post_json(&router, "/api/ingest", scenario_one()).await;
    let (_, second) = post_json(&router, "/api/ingest", scenario_one()).await;

    assert_eq!(first["id"], 1);
    assert_eq!(second["id"], 2);
    assert_eq!(first["flags"]["duplicate"], false, "computed before the duplicate existed");

    let (_, refetched_first) = get_json(&router, "/api/receipts?receiptId=1").await;
    assert_eq!(refetched_first[0]["flags"]["duplicate"], true);
    assert_eq!(second["flags"]["duplicate"], true);
}

#[tokio::test]
async fn scenario_3_math_error() {
    let state = test_state(StubCompletionClient::default());
    let router = build_router(state);

    let (status, body) = post_json(&router, "/api/ingest", scenario_three()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flags"]["mathError"], true);
    assert_eq!(body["flags"]["suspiciousCategory"], true);
}

#[tokio::test]
async fn scenario_4_missing_vat() {
    let state = test_state(StubCompletionClient::default());
    let router = build_router(state);

    let mut request = scenario_one();
    request["tax"] = json!("0.00");
    let (status, body) = post_json(&router, "/api/ingest", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flags"]["missingVat"], true);
    assert_eq!(body["flags"]["duplicate"], false);
    assert_eq!(body["flags"]["mathError"], false);
}

#[tokio::test]
async fn scenario_5_alcohol_query() {
    let state = test_state(StubCompletionClient::default());
    let router = build_router(state);

    post_json(&router, "/api/ingest", scenario_one()).await;
    post_json(&router, "/api/ingest", scenario_three()).await;

    let (status, body) = post_json(
        &router,
        "/api/chat/query",
        json!({"query": "how much did I spend on alcohol?"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalAmount"], "25.00");
    assert_eq!(body["count"], 1);
    assert_eq!(body["receiptIds"], json!([2]));
}

#[tokio::test]
async fn scenario_6_extraction_fallback() {
    let state = test_state(StubCompletionClient::new("this is not recoverable json"));
    let router = build_router(state.clone());

    let (status, body) = post_json(
        &router,
        "/api/extract",
        json!({"image": "Y29ycnVwdA==", "mime": "image/png"}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "EXTRACTION_FAILED");

    let receipts = state
        .ingestor
        .store()
        .list_receipts(Default::default())
        .await
        .unwrap();
    assert!(receipts.is_empty());
}
