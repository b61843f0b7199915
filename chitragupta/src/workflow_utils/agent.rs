//! Backend conversation utilities with automatic logging

use crate::backend::{BackendError, ChatRequest, LlmBackend};
use chitragupta_sdk::{log_agent_complete, log_agent_failed, log_agent_start, RunLogger};
use tracing::debug;

/// Configuration for one backend conversation
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Task ID this agent belongs to
    pub task_id: String,
    /// Agent name (for logging)
    pub agent_name: String,
    /// Description of what this agent is doing
    pub description: String,
    /// System instruction and prompt sent to the backend
    pub request: ChatRequest,
}

impl AgentConfig {
    /// Create a new agent configuration
    pub fn new(
        task_id: impl Into<String>,
        agent_name: impl Into<String>,
        description: impl Into<String>,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_name: agent_name.into(),
            description: description.into(),
            request: ChatRequest::new(system, prompt),
        }
    }
}

/// Execute one backend conversation with automatic logging
///
/// Handles:
/// - Agent start/complete/failed logging on the run's logger
/// - Debug tracing of request and response sizes
///
/// Returns the backend's reply text. No retries.
///
/// # Example
/// ```rust,ignore
/// let config = AgentConfig::new(
///     "generate_personas",
///     "Persona Generator",
///     "Brainstorming adversarial personas",
///     PERSONA_SYSTEM_PROMPT,
///     prompt,
/// );
///
/// let response = execute_agent(&logger, backend.as_ref(), config).await?;
/// ```
pub async fn execute_agent(
    logger: &RunLogger,
    backend: &dyn LlmBackend,
    config: AgentConfig,
) -> Result<String, BackendError> {
    let AgentConfig {
        task_id,
        agent_name,
        description,
        request,
    } = config;

    log_agent_start!(logger, &task_id, &agent_name, &description);
    debug!(
        session_id = %logger.session_id(),
        task_id = %task_id,
        agent = %agent_name,
        backend = backend.name(),
        prompt_len = request.prompt.len(),
        "execute_agent called"
    );

    match backend.chat(request).await {
        Ok(response) => {
            debug!(task_id = %task_id, response_len = response.len(), "Agent reply received");
            log_agent_complete!(
                logger,
                &task_id,
                &agent_name,
                format!("{} chars", response.len())
            );
            Ok(response)
        }
        Err(e) => {
            log_agent_failed!(logger, &task_id, &agent_name, e);
            Err(e)
        }
    }
}
