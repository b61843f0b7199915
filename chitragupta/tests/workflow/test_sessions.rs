//! Tests for session lookup, listing and eviction

use super::common::*;
use chitragupta::fanout::FanOutExecutor;
use chitragupta::session::InMemorySessionStore;
use chitragupta_sdk::{context_keys, RunState, SessionError, SessionId, WorkflowRuntime};

#[tokio::test]
async fn test_get_session_is_stable_without_writes() {
    let h = harness(
        ScriptedGenerator::personas(&["a", "b"]),
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );
    let run = h.orchestrator.start("X", 2).await.unwrap();

    let first = h.orchestrator.get_session(&run.session_id).await.unwrap();
    let second = h.orchestrator.get_session(&run.session_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.stage, RunState::Completed);
    assert_eq!(first.target(), Some("X"));
    assert!(first.get(context_keys::WORK_RESULTS).is_some());
}

#[tokio::test]
async fn test_list_and_evict() {
    let h = harness(
        TargetEchoGenerator,
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );
    let first = h.orchestrator.start("alpha", 1).await.unwrap();
    let second = h.orchestrator.start("beta", 1).await.unwrap();

    let listed = h.orchestrator.list_sessions().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.session_id);
    assert_eq!(listed[1].target.as_deref(), Some("beta"));

    let evicted = h.orchestrator.evict_session(&first.session_id).await.unwrap();
    assert_eq!(evicted.id, first.session_id);

    let listed = h.orchestrator.list_sessions().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second.session_id);
    assert_eq!(
        h.orchestrator.get_session(&first.session_id).await,
        Err(SessionError::NotFound(first.session_id))
    );
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let h = harness(
        ScriptedGenerator::personas(&[]),
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );
    let id = SessionId::new();

    assert_eq!(
        h.orchestrator.get_session(&id).await,
        Err(SessionError::NotFound(id))
    );
    assert!(h.orchestrator.evict_session(&id).await.is_err());
    assert!(h.orchestrator.get_logs(&id).await.is_err());
    assert!(h.orchestrator.cancel_workflow(&id).await.is_err());
}

#[tokio::test]
async fn test_evicted_run_has_no_logs() {
    let h = harness(
        ScriptedGenerator::personas(&["a"]),
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );
    let run = h.orchestrator.start("X", 1).await.unwrap();
    assert!(!h.orchestrator.get_logs(&run.session_id).await.unwrap().is_empty());

    h.orchestrator.evict_session(&run.session_id).await.unwrap();

    assert!(h.orchestrator.get_logs(&run.session_id).await.is_err());
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_capacity_limit_evicts_oldest_finished_session() {
    let h = harness_with(
        InMemorySessionStore::with_capacity_limit(2),
        TargetEchoGenerator,
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
        FanOutExecutor::default(),
    );

    let first = h.orchestrator.start("one", 1).await.unwrap();
    let second = h.orchestrator.start("two", 1).await.unwrap();
    let third = h.orchestrator.start("three", 1).await.unwrap();

    assert_eq!(h.store.len().await, 2);
    assert!(h.orchestrator.get_session(&first.session_id).await.is_err());
    assert!(h.orchestrator.get_session(&second.session_id).await.is_ok());
    assert!(h.orchestrator.get_session(&third.session_id).await.is_ok());
}

#[tokio::test]
async fn test_capacity_eviction_also_drops_run_events() {
    let h = harness_with(
        InMemorySessionStore::with_capacity_limit(1),
        TargetEchoGenerator,
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
        FanOutExecutor::default(),
    );

    let first = h.orchestrator.start("one", 2).await.unwrap();
    for target in ["two", "three", "four", "five"] {
        h.orchestrator.start(target, 2).await.unwrap();
    }

    assert_eq!(h.store.len().await, 1);
    assert_eq!(h.orchestrator.executions().len(), 1);
    assert_eq!(
        h.orchestrator.get_logs(&first.session_id).await,
        Err(SessionError::NotFound(first.session_id))
    );
    assert_eq!(
        h.orchestrator.cancel_workflow(&first.session_id).await,
        Err(SessionError::NotFound(first.session_id))
    );
}

#[tokio::test]
async fn test_cleanup_drops_finished_sessions() {
    let h = harness(
        ScriptedGenerator::personas(&["a"]),
        ScriptedProber::new(),
        RecordingSynthesizer::new(),
    );
    h.orchestrator.start("X", 1).await.unwrap();
    h.orchestrator.start("Y", 1).await.unwrap();

    assert_eq!(h.orchestrator.cleanup_sessions().await, 2);
    assert!(h.store.is_empty().await);
    assert!(h.orchestrator.executions().is_empty());
}
