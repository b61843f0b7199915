/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                          RED-TEAM WORKFLOW SERVER                            │
└─────────────────────────────────────────────────────────────────────────────┘

  POST /run_workflow { target, count }
    │
    └─> Create session, store target

         ↓

  Phase 1: GENERATE PERSONAS
    │
    ├─> Ask the backend for `count` adversarial personas
    ├─> Parse the reply strictly as a list of strings
    └─> Failure aborts the run: Aborted(Generating)

         ↓

  Phase 2: PROBE TARGET (concurrent, capped by --max-concurrency)
    │
    ├─> For each persona:
    │   ├─> Craft adversarial prompts
    │   ├─> Send them to the target model
    │   └─> Summarize findings
    └─> Every probe ends as Success or Failure(index, reason)

         ↓

  Phase 3: SYNTHESIZE REPORT
    │
    ├─> Digest of all findings, failed probes included
    ├─> Backend writes the markdown report
    └─> Failure aborts the run: Aborted(Synthesizing)

         ↓

  200 { session_id, status: "completed", report }
  502 { error, code: "WORKFLOW_ABORTED", details: { session_id, stage } }
*/

use anyhow::{Context, Result};
use chitragupta::backend::{GeminiBackend, LlmBackend};
use chitragupta::config::{Args, Config};
use chitragupta::logging::init_logging;
use chitragupta::server::{serve, spawn_cleanup_task, AppState};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_args(args).context("Invalid configuration")?;
    init_logging(&config.logging)?;

    tracing::info!(
        listen = %config.listen,
        model = %config.backend.model,
        max_concurrency = config.max_concurrency,
        attempts = config.attempts,
        "Starting Chitragupta"
    );

    let backend: Arc<dyn LlmBackend> = Arc::new(
        GeminiBackend::new(
            &config.backend.endpoint,
            &config.backend.model,
            &config.backend.api_key,
            config.backend.request_timeout,
        )
        .context("Failed to create Gemini backend")?,
    );

    let orchestrator = Arc::new(chitragupta::build_orchestrator(&config, backend));
    if let Some(every) = config.cleanup_interval {
        tracing::info!(interval_secs = every.as_secs(), "Periodic session cleanup enabled");
        spawn_cleanup_task(orchestrator.clone(), every);
    }
    let state = AppState::new(orchestrator, config.default_count);

    serve(config.listen, state)
        .await
        .with_context(|| format!("Server on {} failed", config.listen))?;

    Ok(())
}
