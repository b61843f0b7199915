use thiserror::Error;

use crate::{SessionId, StageName};

/// Failure of the Generate stage. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("malformed generator output: {0}")]
    Malformed(String),
}

/// Failure of a single probe. Scoped to one work item and never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Backend(String),
    #[error("malformed probe output: {0}")]
    Malformed(String),
}

/// Failure of the Synthesize stage. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("cannot store context key '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

/// What a caller of `run_workflow` sees when no report was produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("workflow aborted at stage {stage}: {reason}")]
    Aborted { stage: StageName, reason: String },
    #[error(transparent)]
    Session(#[from] SessionError),
}
