//! External backend adapter
//!
//! Two collaborators live here: the generative text backend every stage talks
//! to (`LlmBackend`), and the model under test that probes are aimed at
//! (`TargetModel`).

pub mod gemini;
pub mod target;

pub use gemini::GeminiBackend;
pub use target::{SimulatedTarget, TargetModel};

use chitragupta_sdk::{async_trait, GenerationError, ProbeError, SynthesisError};
use std::time::Duration;
use thiserror::Error;

/// One request to the text backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// System instruction, the role the backend plays
    pub system: String,
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("misconfigured: {0}")]
    Misconfiguration(String),
}

impl From<BackendError> for GenerationError {
    fn from(e: BackendError) -> Self {
        GenerationError::Backend(e.to_string())
    }
}

impl From<BackendError> for ProbeError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout(_) => ProbeError::Timeout,
            other => ProbeError::Backend(other.to_string()),
        }
    }
}

impl From<BackendError> for SynthesisError {
    fn from(e: BackendError) -> Self {
        SynthesisError::Backend(e.to_string())
    }
}

/// Generative text backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError>;
}
