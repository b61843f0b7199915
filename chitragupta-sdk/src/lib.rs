mod error;

pub use error::{GenerationError, ProbeError, SessionError, SynthesisError, WorkflowError};

// Re-export async trait for convenience
pub use async_trait::async_trait;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the live event channel of a single run
pub const LOG_CHANNEL_CAPACITY: usize = 1000;

/// Well-known keys written into a session's context by the orchestrator
pub mod context_keys {
    pub const TARGET: &str = "target";
    pub const WORK_ITEMS: &str = "work_items";
    pub const WORK_RESULTS: &str = "work_results";
    pub const OUTCOME: &str = "outcome";
}

/// Opaque identifier of a workflow run and its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The three stages of a run, named after the state the run is in while the
/// stage executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Generating,
    ProbingFanOut,
    Synthesizing,
}

impl StageName {
    pub const TOTAL: usize = 3;

    /// 1-based phase number used in run events
    pub fn phase(&self) -> usize {
        match self {
            StageName::Generating => 1,
            StageName::ProbingFanOut => 2,
            StageName::Synthesizing => 3,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StageName::Generating => "Generate Personas",
            StageName::ProbingFanOut => "Probe Target",
            StageName::Synthesizing => "Synthesize Report",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageName::Generating => "Generating",
            StageName::ProbingFanOut => "ProbingFanOut",
            StageName::Synthesizing => "Synthesizing",
        };
        f.write_str(name)
    }
}

/// Stage marker of a session. Transitions only move forward; `Completed` and
/// `Aborted` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Created,
    Generating,
    ProbingFanOut,
    Synthesizing,
    Completed,
    Aborted { at_stage: StageName },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted { .. })
    }

    /// Stage a non-terminal run is working in. `Created` counts as Generating.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            RunState::Created | RunState::Generating => Some(StageName::Generating),
            RunState::ProbingFanOut => Some(StageName::ProbingFanOut),
            RunState::Synthesizing => Some(StageName::Synthesizing),
            RunState::Completed | RunState::Aborted { .. } => None,
        }
    }
}

impl From<StageName> for RunState {
    fn from(stage: StageName) -> Self {
        match stage {
            StageName::Generating => RunState::Generating,
            StageName::ProbingFanOut => RunState::ProbingFanOut,
            StageName::Synthesizing => RunState::Synthesizing,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Created => f.write_str("Created"),
            RunState::Generating => f.write_str("Generating"),
            RunState::ProbingFanOut => f.write_str("ProbingFanOut"),
            RunState::Synthesizing => f.write_str("Synthesizing"),
            RunState::Completed => f.write_str("Completed"),
            RunState::Aborted { at_stage } => write!(f, "Aborted({})", at_stage),
        }
    }
}

/// Per-run state record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub context: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub stage: RunState,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            context: BTreeMap::new(),
            created_at: Utc::now(),
            stage: RunState::Created,
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.get(key)
    }

    pub fn target(&self) -> Option<&str> {
        self.context
            .get(context_keys::TARGET)
            .and_then(|v| v.as_str())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            stage: self.stage,
            created_at: self.created_at,
            target: self.target().map(str::to_string),
        }
    }
}

/// Listing entry for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub stage: RunState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// One unit of fan-out work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub index: usize,
    pub persona: String,
    pub target: String,
}

impl WorkItem {
    pub fn new(index: usize, persona: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            index,
            persona: persona.into(),
            target: target.into(),
        }
    }
}

/// Outcome of one work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkResult {
    Success { value: String },
    Failure { item_index: usize, reason: String },
}

impl WorkResult {
    pub fn success(value: impl Into<String>) -> Self {
        WorkResult::Success {
            value: value.into(),
        }
    }

    pub fn failure(item_index: usize, reason: impl Into<String>) -> Self {
        WorkResult::Failure {
            item_index,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkResult::Success { .. })
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { report: String },
    Aborted { stage: StageName, reason: String },
}

/// Aggregate view of one finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub session_id: SessionId,
    pub items: Vec<WorkItem>,
    pub results: Vec<WorkResult>,
    pub outcome: RunOutcome,
}

impl WorkflowRun {
    pub fn report(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Completed { report } => Some(report),
            RunOutcome::Aborted { .. } => None,
        }
    }

    /// Collapse the run into the artifact or the single abort reason
    pub fn into_result(self) -> Result<String, WorkflowError> {
        match self.outcome {
            RunOutcome::Completed { report } => Ok(report),
            RunOutcome::Aborted { stage, reason } => Err(WorkflowError::Aborted { stage, reason }),
        }
    }
}

/// Stage 1: turn a target description into an ordered list of personas
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        logger: &RunLogger,
        target: &str,
        count: usize,
    ) -> Result<Vec<String>, GenerationError>;
}

/// Stage 2: probe the target as one persona
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, logger: &RunLogger, item: &WorkItem) -> Result<String, ProbeError>;
}

/// Stage 3: aggregate every probe outcome into one artifact. Must not fail on
/// an empty `results`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        logger: &RunLogger,
        target: &str,
        results: &[WorkResult],
    ) -> Result<String, SynthesisError>;
}

/// Structured events emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowLog {
    /// Phase started
    PhaseStarted {
        phase: usize,
        name: String,
        total_phases: usize,
    },
    /// Phase completed
    PhaseCompleted {
        phase: usize,
        name: String,
    },
    /// Phase failed
    PhaseFailed {
        phase: usize,
        name: String,
        error: String,
    },
    /// Task started
    TaskStarted {
        phase: usize,
        task_id: String,
        description: String,
        total_tasks: Option<usize>,
    },
    /// Task completed
    TaskCompleted {
        task_id: String,
        result: Option<String>,
    },
    /// Task failed
    TaskFailed {
        task_id: String,
        error: String,
    },
    /// Agent started (backend conversation within a task)
    AgentStarted {
        task_id: String,
        agent_name: String,
        description: String,
    },
    /// Agent completed
    AgentCompleted {
        task_id: String,
        agent_name: String,
        result: Option<String>,
    },
    /// Agent failed
    AgentFailed {
        task_id: String,
        agent_name: String,
        error: String,
    },
    /// Session context key written
    StateUpdated {
        phase: usize,
        key: String,
    },
}

/// Logging handle bound to one run. Cloned into every component that works
/// on the run; the session id is the correlation id of every event.
#[derive(Debug, Clone)]
pub struct RunLogger {
    session_id: SessionId,
    history: Arc<Mutex<Vec<WorkflowLog>>>,
    tx: broadcast::Sender<WorkflowLog>,
}

impl RunLogger {
    pub fn new(session_id: SessionId) -> Self {
        let (tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self {
            session_id,
            history: Arc::new(Mutex::new(Vec::new())),
            tx,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Record an event: tracing, run history, then live subscribers
    pub fn emit(&self, log: WorkflowLog) {
        match serde_json::to_string(&log) {
            Ok(json) => tracing::info!(session_id = %self.session_id, event = %json, "workflow event"),
            Err(e) => tracing::warn!(session_id = %self.session_id, error = %e, "unserializable workflow event"),
        }

        match self.history.lock() {
            Ok(mut history) => history.push(log.clone()),
            Err(poisoned) => poisoned.into_inner().push(log.clone()),
        }

        // No subscribers is fine
        let _ = self.tx.send(log);
    }

    pub fn history(&self) -> Vec<WorkflowLog> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowLog> {
        self.tx.subscribe()
    }
}

#[macro_export]
macro_rules! log_phase_start {
    ($logger:expr, $stage:expr) => {
        $logger.emit($crate::WorkflowLog::PhaseStarted {
            phase: $stage.phase(),
            name: $stage.title().to_string(),
            total_phases: $crate::StageName::TOTAL,
        })
    };
}

#[macro_export]
macro_rules! log_phase_complete {
    ($logger:expr, $stage:expr) => {
        $logger.emit($crate::WorkflowLog::PhaseCompleted {
            phase: $stage.phase(),
            name: $stage.title().to_string(),
        })
    };
}

#[macro_export]
macro_rules! log_phase_failed {
    ($logger:expr, $stage:expr, $error:expr) => {
        $logger.emit($crate::WorkflowLog::PhaseFailed {
            phase: $stage.phase(),
            name: $stage.title().to_string(),
            error: $error.to_string(),
        })
    };
}

#[macro_export]
macro_rules! log_task_start {
    ($logger:expr, $phase:expr, $task_id:expr, $desc:expr) => {
        $logger.emit($crate::WorkflowLog::TaskStarted {
            phase: $phase,
            task_id: $task_id.to_string(),
            description: $desc.to_string(),
            total_tasks: None,
        })
    };
    ($logger:expr, $phase:expr, $task_id:expr, $desc:expr, $total:expr) => {
        $logger.emit($crate::WorkflowLog::TaskStarted {
            phase: $phase,
            task_id: $task_id.to_string(),
            description: $desc.to_string(),
            total_tasks: Some($total),
        })
    };
}

#[macro_export]
macro_rules! log_task_complete {
    ($logger:expr, $task_id:expr) => {
        $logger.emit($crate::WorkflowLog::TaskCompleted {
            task_id: $task_id.to_string(),
            result: None,
        })
    };
    ($logger:expr, $task_id:expr, $result:expr) => {
        $logger.emit($crate::WorkflowLog::TaskCompleted {
            task_id: $task_id.to_string(),
            result: Some($result.to_string()),
        })
    };
}

#[macro_export]
macro_rules! log_task_failed {
    ($logger:expr, $task_id:expr, $error:expr) => {
        $logger.emit($crate::WorkflowLog::TaskFailed {
            task_id: $task_id.to_string(),
            error: $error.to_string(),
        })
    };
}

#[macro_export]
macro_rules! log_agent_start {
    ($logger:expr, $task_id:expr, $agent:expr, $desc:expr) => {
        $logger.emit($crate::WorkflowLog::AgentStarted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            description: $desc.to_string(),
        })
    };
}

#[macro_export]
macro_rules! log_agent_complete {
    ($logger:expr, $task_id:expr, $agent:expr) => {
        $logger.emit($crate::WorkflowLog::AgentCompleted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            result: None,
        })
    };
    ($logger:expr, $task_id:expr, $agent:expr, $result:expr) => {
        $logger.emit($crate::WorkflowLog::AgentCompleted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            result: Some($result.to_string()),
        })
    };
}

#[macro_export]
macro_rules! log_agent_failed {
    ($logger:expr, $task_id:expr, $agent:expr, $error:expr) => {
        $logger.emit($crate::WorkflowLog::AgentFailed {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            error: $error.to_string(),
        })
    };
}

#[macro_export]
macro_rules! log_state_updated {
    ($logger:expr, $stage:expr, $key:expr) => {
        $logger.emit($crate::WorkflowLog::StateUpdated {
            phase: $stage.phase(),
            key: $key.to_string(),
        })
    };
}

/// Runtime trait for workflow execution and inspection.
/// This is the surface remote callers are served from.
#[async_trait]
pub trait WorkflowRuntime: Send + Sync {
    /// Run a workflow to completion. Errors only when the run's own session
    /// disappears; stage failures are reported in the returned outcome.
    async fn execute_workflow(&self, target: &str, count: usize)
        -> Result<WorkflowRun, SessionError>;

    /// Get a snapshot of a session
    async fn get_session(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// List all sessions still held by the store
    async fn list_sessions(&self) -> Vec<SessionSummary>;

    /// Remove a session and its run events
    async fn evict_session(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// Events recorded so far for a run
    async fn get_logs(&self, id: &SessionId) -> Result<Vec<WorkflowLog>, SessionError>;

    /// Subscribe to events from a running workflow
    async fn subscribe_logs(
        &self,
        id: &SessionId,
    ) -> Result<broadcast::Receiver<WorkflowLog>, SessionError>;

    /// Request cooperative cancellation of a running workflow
    async fn cancel_workflow(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Drop every finished session together with its run events. Returns how
    /// many were dropped.
    async fn cleanup_sessions(&self) -> usize;
}
