use chitragupta_sdk::{RunLogger, SessionError, SessionId, WorkflowLog};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Execution status of a run, as tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Aborted,
}

/// Internal execution state for a workflow run
struct ExecutionState {
    status: ExecutionStatus,
    cancel: CancellationToken,
    /// Event history and live channel of the run
    logger: RunLogger,
}

/// Registry of workflow executions, keyed by session id
#[derive(Clone, Default)]
pub struct ExecutionRegistry {
    executions: Arc<Mutex<HashMap<SessionId, ExecutionState>>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, ExecutionState>> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new run. Returns the logger and cancellation token the run
    /// must use.
    pub fn register(&self, id: SessionId) -> (RunLogger, CancellationToken) {
        let logger = RunLogger::new(id);
        let cancel = CancellationToken::new();
        self.lock().insert(
            id,
            ExecutionState {
                status: ExecutionStatus::Running,
                cancel: cancel.clone(),
                logger: logger.clone(),
            },
        );
        (logger, cancel)
    }

    pub fn finish(&self, id: &SessionId, status: ExecutionStatus) {
        if let Some(state) = self.lock().get_mut(id) {
            state.status = status;
        }
    }

    pub fn status(&self, id: &SessionId) -> Result<ExecutionStatus, SessionError> {
        self.lock()
            .get(id)
            .map(|state| state.status)
            .ok_or(SessionError::NotFound(*id))
    }

    /// Every event the run has emitted so far
    pub fn logs(&self, id: &SessionId) -> Result<Vec<WorkflowLog>, SessionError> {
        self.lock()
            .get(id)
            .map(|state| state.logger.history())
            .ok_or(SessionError::NotFound(*id))
    }

    /// Events emitted from now on
    pub fn subscribe(
        &self,
        id: &SessionId,
    ) -> Result<broadcast::Receiver<WorkflowLog>, SessionError> {
        self.lock()
            .get(id)
            .map(|state| state.logger.subscribe())
            .ok_or(SessionError::NotFound(*id))
    }

    /// Ask a run to stop starting new probes. Probes already running finish.
    pub fn cancel(&self, id: &SessionId) -> Result<(), SessionError> {
        let executions = self.lock();
        let state = executions.get(id).ok_or(SessionError::NotFound(*id))?;
        if state.status == ExecutionStatus::Running {
            state.cancel.cancel();
            tracing::info!(session_id = %id, "Cancellation requested");
        }
        Ok(())
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Number of runs whose state is still held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
