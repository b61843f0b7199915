//! Tests for the HTTP surface, driven through the router without a socket

use super::common::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chitragupta::server::{create_router, AppState};
use chitragupta_sdk::{GenerationError, RunState, SessionId, WorkflowRuntime};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    create_router(AppState::new(h.orchestrator.clone(), 5))
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn default_harness() -> Harness {
    harness(
        TargetEchoGenerator,
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    )
}

#[tokio::test]
async fn test_health() {
    let h = default_harness();
    let (status, body) = send(router(&h), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_run_workflow_returns_report() {
    let h = default_harness();
    let (status, body) = send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "airline bot", "count": 2 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["report"], "report for airline bot: 2/2 probes succeeded");
    assert!(body["session_id"].as_str().unwrap().parse::<SessionId>().is_ok());
    assert_eq!(h.prober.calls(), 2);
}

#[tokio::test]
async fn test_run_workflow_uses_default_count() {
    let h = default_harness();

    let (status, body) = send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "bot" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"], "report for bot: 5/5 probes succeeded");
    assert_eq!(h.prober.calls(), 5);
}

#[tokio::test]
async fn test_aborted_run_maps_to_bad_gateway() {
    let h = harness(
        ScriptedGenerator::failing(GenerationError::Malformed("not a list".to_string())),
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );

    let (status, body) = send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "bot", "count": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "WORKFLOW_ABORTED");
    assert_eq!(body["details"]["stage"], "generating");
    assert!(body["error"].as_str().unwrap().contains("not a list"));
    assert_eq!(h.prober.calls(), 0);
}

#[tokio::test]
async fn test_blank_target_is_rejected() {
    let h = default_harness();
    let (status, body) = send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(h.orchestrator.list_sessions().await.is_empty());
}

#[tokio::test]
async fn test_unknown_and_invalid_session_ids() {
    let h = default_harness();

    let (status, body) = send(router(&h), get(&format!("/sessions/{}", SessionId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(router(&h), get("/sessions/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let h = default_harness();
    let (_, run) = send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "bot", "count": 1 })),
    )
    .await;
    let id = run["session_id"].as_str().unwrap().to_string();
    let uri = format!("/sessions/{}", id);

    let (status, session) = send(router(&h), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["stage"]["state"], "completed");
    assert_eq!(session["context"]["target"], "bot");

    let (status, listed) = send(router(&h), get("/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, logs) = send(router(&h), get(&format!("{}/logs", uri))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!logs.as_array().unwrap().is_empty());

    let (status, cancel) = send(
        router(&h),
        Request::post(format!("{}/cancel", uri))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(cancel["status"], "cancelling");

    let (status, evicted) = send(
        router(&h),
        Request::delete(&uri).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evicted["id"], id);

    let (status, _) = send(router(&h), get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_survives_caller_disconnect() {
    let h = harness(
        ScriptedGenerator::personas(&["a", "b", "c"]),
        ScriptedProber::new().with_default_delay(100),
        RecordingSynthesizer::new(),
    );

    // Caller goes away while the probes are in flight
    let request = tokio::spawn(router(&h).oneshot(post_json(
        "/run_workflow",
        json!({ "target": "bot", "count": 3 }),
    )));
    while h.prober.calls() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    request.abort();

    let id = loop {
        let sessions = h.orchestrator.list_sessions().await;
        if sessions.iter().all(|s| s.stage.is_terminal()) {
            break sessions[0].id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.stage, RunState::Completed);
    assert_eq!(h.synthesizer.last_results().len(), 3);
    assert!(h.synthesizer.last_results().iter().all(|r| r.is_success()));
}

#[tokio::test]
async fn test_cleanup_route_drops_finished_sessions() {
    let h = default_harness();
    send(
        router(&h),
        post_json("/run_workflow", json!({ "target": "bot", "count": 1 })),
    )
    .await;

    let (status, body) = send(
        router(&h),
        Request::post("/sessions/cleanup").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    let (_, listed) = send(router(&h), get("/sessions")).await;
    assert!(listed.as_array().unwrap().is_empty());
}
