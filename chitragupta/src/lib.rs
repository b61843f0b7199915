// Session store module
pub mod session;

// Workflow building blocks (batch, task, agent, parse)
pub mod workflow_utils;

// Fan-out executor module
pub mod fanout;

// Execution registry module
pub mod runtime;

// Workflow orchestrator module
pub mod orchestrator;

// External backend adapter module
pub mod backend;

// Red-team stages module
pub mod redteam;

// Configuration and logging
pub mod config;
pub mod logging;

// HTTP server module
pub mod server;

use std::sync::Arc;

use backend::{LlmBackend, SimulatedTarget};
use config::Config;
use fanout::FanOutExecutor;
use orchestrator::Orchestrator;
use redteam::{PersonaGenerator, RedTeamProber, ReportSynthesizer};
use session::InMemorySessionStore;

/// Wire the red-team stages, a fresh session store and the fan-out settings
/// from `config` around one shared backend
pub fn build_orchestrator(config: &Config, backend: Arc<dyn LlmBackend>) -> Orchestrator {
    let store = match config.max_sessions {
        Some(limit) => InMemorySessionStore::with_capacity_limit(limit),
        None => InMemorySessionStore::new(),
    };

    let generator = PersonaGenerator::new(backend.clone()).with_fallback(config.persona_fallback);
    let prober = RedTeamProber::new(backend.clone(), Arc::new(SimulatedTarget))
        .with_attempts(config.attempts);
    let synthesizer = ReportSynthesizer::new(backend);

    Orchestrator::new(
        Arc::new(store),
        Arc::new(generator),
        Arc::new(prober),
        Arc::new(synthesizer),
    )
    .with_fanout(FanOutExecutor::new(config.max_concurrency).with_probe_timeout(config.probe_timeout))
}
