//! Command-line client: run one red-team workflow on a remote server

use anyhow::{bail, Context, Result};
use chitragupta::config::LoggingConfig;
use chitragupta::logging::init_logging;
use chitragupta::server::{ErrorResponse, RunWorkflowRequest, RunWorkflowResponse};
use clap::Parser;
use std::time::Duration;

const DEFAULT_TARGET: &str = "A new generative AI chatbot for a major airline. It is supposed \
to answer questions about flights, baggage policies, and handle re-booking.";

#[derive(Parser, Debug)]
#[command(name = "chitragupta-client", version)]
struct Args {
    /// Base URL of the Chitragupta server
    #[arg(long, env = "CHITRAGUPTA_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Description of the model under test
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Number of personas to test with (server default when omitted)
    #[arg(long)]
    count: Option<usize>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 900)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(&LoggingConfig {
        level: "info".to_string(),
        json: false,
    })?;

    tracing::info!("--- Starting Chitragupta Client ---");
    tracing::info!(target_model = %args.target, count = ?args.count, "Requesting workflow run");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let url = format!("{}/run_workflow", args.server.trim_end_matches('/'));
    let response = client
        .post(&url)
        .json(&RunWorkflowRequest {
            target: args.target,
            count: args.count,
        })
        .send()
        .await
        .with_context(|| format!("Request to {} failed. Is the server running?", url))?;

    let status = response.status();
    if status.is_success() {
        let body: RunWorkflowResponse = response
            .json()
            .await
            .context("Server returned an unreadable report")?;
        tracing::info!(session_id = %body.session_id, "--- WORKFLOW COMPLETE ---");
        println!("{}", body.report);
        return Ok(());
    }

    match response.json::<ErrorResponse>().await {
        Ok(error) => bail!("{} ({}): {}", status, error.code, error.error),
        Err(_) => bail!("Server returned {}", status),
    }
}
