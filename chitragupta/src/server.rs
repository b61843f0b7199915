//! HTTP surface for remote callers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chitragupta_sdk::{
    RunOutcome, Session, SessionError, SessionId, SessionSummary, StageName, WorkflowLog,
    WorkflowRuntime,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::interval;
use tower_http::trace::TraceLayer;

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("workflow aborted at stage {stage}: {reason}")]
    WorkflowAborted {
        session_id: SessionId,
        stage: StageName,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => ApiError::NotFound(e.to_string()),
            SessionError::Serialization { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
            ApiError::WorkflowAborted {
                session_id, stage, ..
            } => (
                StatusCode::BAD_GATEWAY,
                "WORKFLOW_ABORTED",
                Some(serde_json::json!({
                    "session_id": session_id,
                    "stage": stage,
                })),
            ),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn WorkflowRuntime>,
    /// Persona count used when a request omits `count`
    pub default_count: usize,
}

impl AppState {
    pub fn new(runtime: Arc<dyn WorkflowRuntime>, default_count: usize) -> Self {
        Self {
            runtime,
            default_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunWorkflowResponse {
    pub session_id: SessionId,
    pub status: String,
    pub report: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run_workflow", post(run_workflow))
        .route("/sessions", get(list_sessions))
        .route("/sessions/cleanup", post(cleanup_sessions))
        .route("/sessions/:id", get(get_session).delete(evict_session))
        .route("/sessions/:id/logs", get(get_logs))
        .route("/sessions/:id/cancel", post(cancel_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_id(raw: &str) -> ApiResult<SessionId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid session id: {}", raw)))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunWorkflowRequest>,
) -> ApiResult<Json<RunWorkflowResponse>> {
    let target = request.target.trim();
    if target.is_empty() {
        return Err(ApiError::BadRequest("target must not be empty".to_string()));
    }
    let target = target.to_string();
    let count = request.count.unwrap_or(state.default_count);

    // Own task: a disconnecting caller must not cut the run short
    let runtime = state.runtime.clone();
    let run = tokio::spawn(async move { runtime.execute_workflow(&target, count).await })
        .await
        .map_err(|e| ApiError::Internal(format!("workflow task failed: {}", e)))??;
    match run.outcome {
        RunOutcome::Completed { report } => Ok(Json(RunWorkflowResponse {
            session_id: run.session_id,
            status: "completed".to_string(),
            report,
        })),
        RunOutcome::Aborted { stage, reason } => Err(ApiError::WorkflowAborted {
            session_id: run.session_id,
            stage,
            reason,
        }),
    }
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.runtime.list_sessions().await)
}

async fn cleanup_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let removed = state.runtime.cleanup_sessions().await;
    Json(serde_json::json!({ "removed": removed }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_id(&id)?;
    Ok(Json(state.runtime.get_session(&id).await?))
}

async fn evict_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSummary>> {
    let id = parse_id(&id)?;
    let session = state.runtime.evict_session(&id).await?;
    tracing::info!(session_id = %id, "Session evicted");
    Ok(Json(session.summary()))
}

async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WorkflowLog>>> {
    let id = parse_id(&id)?;
    Ok(Json(state.runtime.get_logs(&id).await?))
}

async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let id = parse_id(&id)?;
    state.runtime.cancel_workflow(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "session_id": id, "status": "cancelling" })),
    ))
}

/// Periodically drop finished sessions and their run events
pub fn spawn_cleanup_task(
    runtime: Arc<dyn WorkflowRuntime>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = runtime.cleanup_sessions().await;
            tracing::debug!(removed, "Periodic session cleanup");
        }
    })
}

/// Serve until Ctrl+C or SIGTERM
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Chitragupta listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Chitragupta shutting down");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
