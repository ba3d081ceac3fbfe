use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use pharmaledger_core::{HealthStatus, Ledger, LedgerConfig};
use pharmaledger_node::{router, spawn_health_loop, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn test_state() -> AppState {
    let config = LedgerConfig::default()
        .with_difficulty(4)
        .with_facility("api-test");
    AppState::new(Ledger::new(config).unwrap())
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn liveness_and_initial_chain() {
    let app = router(test_state());
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, chain) = call(&app, "GET", "/chain", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain.as_array().unwrap().len(), 1);
    assert_eq!(chain[0]["block_type"], "genesis");

    let (status, summary) = call(&app, "GET", "/chain/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["facility_id"], "api-test");
    assert_eq!(summary["chain_status"], "unknown");
}

#[tokio::test]
async fn submit_mine_and_verify() {
    let app = router(test_state());
    let (status, t1) = call(
        &app,
        "POST",
        "/tx",
        Some(json!({"type": "sensor-reading", "payload": {"temp_dc": 45}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, t2) = call(
        &app,
        "POST",
        "/tx",
        Some(json!({"type": "deviation", "payload": {"temp_dc": 95}})),
    )
    .await;
    let t1_id = t1["id"].as_str().unwrap().to_string();

    let (status, pending) = call(&app, "GET", "/mempool", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 2);

    let (status, pending_tx) = call(&app, "GET", &format!("/tx/{t1_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending_tx["status"], "pending");

    let (status, block) = call(&app, "POST", "/mine", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(block["header"]["block_number"], 1);
    assert_eq!(block["transactions"][0]["id"], t1["id"]);
    assert_eq!(block["transactions"][1]["id"], t2["id"]);

    let (_, latest) = call(&app, "GET", "/chain/latest", None).await;
    assert_eq!(latest, block);
    let (_, by_number) = call(&app, "GET", "/chain/blocks/1", None).await;
    assert_eq!(by_number, block);

    let (status, located) = call(&app, "GET", &format!("/tx/{t1_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(located["status"], "mined");
    assert_eq!(located["location"]["block_number"], 1);

    let (status, verification) = call(&app, "GET", &format!("/tx/{t1_id}/verify"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verification["verified"], true);
    assert_eq!(verification["block_number"], 1);

    let (status, report) = call(&app, "POST", "/chain/validate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["is_valid"], true);
    assert_eq!(report["total_blocks"], 2);

    let (_, summary) = call(&app, "GET", "/chain/summary", None).await;
    assert_eq!(summary["chain_status"], "valid");
    assert_eq!(summary["total_transactions"], 2);
}

#[tokio::test]
async fn mine_with_compliance_metadata() {
    let app = router(test_state());
    call(&app, "POST", "/tx", Some(json!({"type": "audit", "payload": {"room": "B"}}))).await;
    let (status, block) = call(
        &app,
        "POST",
        "/mine",
        Some(json!({
            "block_type": "compliance-audit",
            "compliance_checks": [{"type": "temperature-range", "passed": true}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(block["block_type"], "compliance-audit");
    assert_eq!(block["compliance_checks"][0]["type"], "temperature-range");
}

#[tokio::test]
async fn error_statuses() {
    let app = router(test_state());

    let (status, body) = call(&app, "POST", "/mine", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("nothing to mine"));

    let (status, _) = call(&app, "GET", "/chain/blocks/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/tx/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "POST", "/mine", Some(json!({"block_type": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn duplicate_of_mined_transaction_conflicts() {
    let state = test_state();
    let app = router(state.clone());
    let (_, tx) = call(&app, "POST", "/tx", Some(json!({"type": "audit", "payload": {}}))).await;
    call(&app, "POST", "/mine", None).await;

    let resubmitted = serde_json::from_value(tx).unwrap();
    let err = state.ledger.enqueue(resubmitted).unwrap_err();
    let response = axum::response::IntoResponse::into_response(pharmaledger_node::ApiError::from(err));
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_transaction_verifies_false() {
    let app = router(test_state());
    let (status, body) = call(&app, "GET", "/tx/nope/verify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"verified": false, "reason": "not found"}));
}

#[tokio::test]
async fn cancel_without_active_job() {
    let app = router(test_state());
    let (status, body) = call(&app, "POST", "/mine/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn health_loop_reports_healthy_after_first_poll() {
    let state = test_state();
    let app = router(state.clone());
    let (_, before) = call(&app, "GET", "/health/ledger", None).await;
    assert_eq!(before["status"], "unknown");

    let handle = spawn_health_loop(state.clone(), Duration::from_millis(50), 1);
    let mut healthy = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, snapshot) = call(&app, "GET", "/health/ledger", None).await;
        if snapshot["status"] == "healthy" {
            assert_eq!(snapshot["chain_length"], 1);
            healthy = true;
            break;
        }
    }
    handle.abort();
    assert!(healthy, "health loop never reported healthy");
    assert_eq!(state.snapshot.read().unwrap().status, HealthStatus::Healthy);
}

#[tokio::test]
async fn ledger_health_answers_while_monitor_is_busy() {
    let state = test_state();
    let app = router(state.clone());
    let polled = state.health.lock().unwrap().poll(&state.ledger, true);
    *state.snapshot.write().unwrap() = polled;

    let busy = state.health.lock().unwrap();
    let (status, body) = tokio::time::timeout(
        Duration::from_secs(2),
        call(&app, "GET", "/health/ledger", None),
    )
    .await
    .expect("health endpoint blocked on the monitor");
    drop(busy);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["chain_length"], 1);
}
