//! Server configuration
//!
//! Every setting is a CLI flag with an environment fallback. `main` loads a
//! `.env` file before parsing, so all of them can live there too.

use crate::backend::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::fanout::DEFAULT_MAX_CONCURRENCY;
use crate::redteam::{FallbackPolicy, DEFAULT_ATTEMPTS};
use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Fatal, pre-run configuration problems
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("GOOGLE_API_KEY environment variable not set (or pass --api-key)")]
    MissingApiKey,
    #[error("backend endpoint must not be empty")]
    EmptyEndpoint,
    #[error("backend model must not be empty")]
    EmptyModel,
    #[error("{0} must be at least 1")]
    MustBePositive(&'static str),
}

/// Red-team workflow orchestration server
#[derive(Parser, Debug, Clone)]
#[command(name = "chitragupta", version)]
pub struct Args {
    /// Address the HTTP server listens on
    #[arg(long, env = "CHITRAGUPTA_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Base URL of the Gemini API
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Gemini model used by every stage
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Backend credential
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Timeout of a single backend request, in seconds
    #[arg(long, env = "CHITRAGUPTA_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Maximum number of probes running at once
    #[arg(long, env = "CHITRAGUPTA_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Timeout of a whole probe, in seconds
    #[arg(long, env = "CHITRAGUPTA_PROBE_TIMEOUT_SECS", default_value_t = 180)]
    pub probe_timeout_secs: u64,

    /// Adversarial prompts sent to the target per probe
    #[arg(long, env = "CHITRAGUPTA_ATTEMPTS", default_value_t = DEFAULT_ATTEMPTS)]
    pub attempts: usize,

    /// Continue with a single generic persona when the persona list cannot be parsed
    #[arg(long, env = "CHITRAGUPTA_PERSONA_FALLBACK")]
    pub persona_fallback: bool,

    /// Persona count used when a request does not name one
    #[arg(long, env = "CHITRAGUPTA_DEFAULT_COUNT", default_value_t = 5)]
    pub default_count: usize,

    /// Soft limit on sessions held in memory
    #[arg(long, env = "CHITRAGUPTA_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    /// Drop finished sessions every N seconds
    #[arg(long, env = "CHITRAGUPTA_CLEANUP_INTERVAL_SECS")]
    pub cleanup_interval_secs: Option<u64>,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, env = "CHITRAGUPTA_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "CHITRAGUPTA_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Clone)]
pub struct BackendConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub backend: BackendConfig,
    pub max_concurrency: usize,
    pub probe_timeout: Duration,
    pub attempts: usize,
    pub persona_fallback: FallbackPolicy,
    pub default_count: usize,
    pub max_sessions: Option<usize>,
    pub cleanup_interval: Option<Duration>,
    pub logging: LoggingConfig,
}

fn positive(value: u64, name: &'static str) -> Result<u64, ConfigurationError> {
    if value == 0 {
        Err(ConfigurationError::MustBePositive(name))
    } else {
        Ok(value)
    }
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigurationError> {
        let api_key = args
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigurationError::MissingApiKey)?;

        if args.endpoint.trim().is_empty() {
            return Err(ConfigurationError::EmptyEndpoint);
        }
        if args.model.trim().is_empty() {
            return Err(ConfigurationError::EmptyModel);
        }

        let request_timeout = positive(args.request_timeout_secs, "request timeout")?;
        positive(args.max_concurrency as u64, "max concurrency")?;
        let probe_timeout = positive(args.probe_timeout_secs, "probe timeout")?;
        positive(args.attempts as u64, "attempts")?;
        if let Some(max) = args.max_sessions {
            positive(max as u64, "max sessions")?;
        }
        let cleanup_interval = args
            .cleanup_interval_secs
            .map(|secs| positive(secs, "cleanup interval").map(Duration::from_secs))
            .transpose()?;

        let persona_fallback = if args.persona_fallback {
            FallbackPolicy::SinglePersona
        } else {
            FallbackPolicy::Fail
        };

        Ok(Self {
            listen: args.listen,
            backend: BackendConfig {
                endpoint: args.endpoint,
                model: args.model,
                api_key,
                request_timeout: Duration::from_secs(request_timeout),
            },
            max_concurrency: args.max_concurrency,
            probe_timeout: Duration::from_secs(probe_timeout),
            attempts: args.attempts,
            persona_fallback,
            default_count: args.default_count,
            max_sessions: args.max_sessions,
            cleanup_interval,
            logging: LoggingConfig {
                level: args.log_level,
                json: args.log_json,
            },
        })
    }
}
