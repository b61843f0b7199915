//! Common test utilities for workflow tests

use chitragupta::backend::{BackendError, ChatRequest, LlmBackend};
use chitragupta::fanout::FanOutExecutor;
use chitragupta::orchestrator::Orchestrator;
use chitragupta::session::{InMemorySessionStore, SessionStore};
use chitragupta_sdk::{
    async_trait, GenerationError, Generator, ProbeError, Prober, RunLogger, SynthesisError,
    Synthesizer, WorkItem, WorkResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generator returning a fixed outcome and recording the requested counts
pub struct ScriptedGenerator {
    outcome: Result<Vec<String>, GenerationError>,
    pub counts: Mutex<Vec<usize>>,
}

impl ScriptedGenerator {
    pub fn personas(personas: &[&str]) -> Self {
        Self::with_outcome(Ok(personas.iter().map(|p| p.to_string()).collect()))
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<Vec<String>, GenerationError>) -> Self {
        Self {
            outcome,
            counts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.counts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        _logger: &RunLogger,
        _target: &str,
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        self.counts.lock().unwrap().push(count);
        self.outcome.clone()
    }
}

/// Generator deriving `count` personas from the target
pub struct TargetEchoGenerator;

#[async_trait]
impl Generator for TargetEchoGenerator {
    async fn generate(
        &self,
        _logger: &RunLogger,
        target: &str,
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        Ok((0..count).map(|i| format!("{}-persona-{}", target, i)).collect())
    }
}

/// Prober scripted per persona. Unscripted personas succeed with
/// `finding-<persona>` after `default_delay_ms`.
pub struct ScriptedProber {
    script: HashMap<String, (u64, Result<String, ProbeError>)>,
    default_delay_ms: u64,
    calls: AtomicUsize,
    pub seen: Mutex<Vec<WorkItem>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            default_delay_ms: 0,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_delay(mut self, delay_ms: u64) -> Self {
        self.default_delay_ms = delay_ms;
        self
    }

    pub fn succeed(mut self, persona: &str, delay_ms: u64, finding: &str) -> Self {
        self.script
            .insert(persona.to_string(), (delay_ms, Ok(finding.to_string())));
        self
    }

    pub fn fail(mut self, persona: &str, delay_ms: u64, error: ProbeError) -> Self {
        self.script
            .insert(persona.to_string(), (delay_ms, Err(error)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _logger: &RunLogger, item: &WorkItem) -> Result<String, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(item.clone());

        let (delay, outcome) = self.script.get(&item.persona).cloned().unwrap_or_else(|| {
            (
                self.default_delay_ms,
                Ok(format!("finding-{}", item.persona)),
            )
        });
        tokio::time::sleep(Duration::from_millis(delay)).await;
        outcome
    }
}

/// Synthesizer recording every result list it receives
pub struct RecordingSynthesizer {
    failure: Option<SynthesisError>,
    pub received: Mutex<Vec<(String, Vec<WorkResult>)>>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            failure: None,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SynthesisError) -> Self {
        Self {
            failure: Some(error),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn last_results(&self) -> Vec<WorkResult> {
        self.received
            .lock()
            .unwrap()
            .last()
            .map(|(_, results)| results.clone())
            .unwrap_or_default()
    }
}

pub fn default_artifact(target: &str) -> String {
    format!("No findings for {}", target)
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(
        &self,
        _logger: &RunLogger,
        target: &str,
        results: &[WorkResult],
    ) -> Result<String, SynthesisError> {
        self.received
            .lock()
            .unwrap()
            .push((target.to_string(), results.to_vec()));

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if results.is_empty() {
            return Ok(default_artifact(target));
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Ok(format!(
            "report for {}: {}/{} probes succeeded",
            target,
            succeeded,
            results.len()
        ))
    }
}

/// An orchestrator and handles on the stages it drives
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<InMemorySessionStore>,
    pub generator: Arc<dyn Generator>,
    pub prober: Arc<ScriptedProber>,
    pub synthesizer: Arc<RecordingSynthesizer>,
}

pub fn harness<G: Generator + 'static>(
    generator: G,
    prober: ScriptedProber,
    synthesizer: RecordingSynthesizer,
) -> Harness {
    harness_with(
        InMemorySessionStore::new(),
        generator,
        prober,
        synthesizer,
        FanOutExecutor::default(),
    )
}

pub fn harness_with<G: Generator + 'static>(
    store: InMemorySessionStore,
    generator: G,
    prober: ScriptedProber,
    synthesizer: RecordingSynthesizer,
    fanout: FanOutExecutor,
) -> Harness {
    let store = Arc::new(store);
    let generator: Arc<dyn Generator> = Arc::new(generator);
    let prober = Arc::new(prober);
    let synthesizer = Arc::new(synthesizer);

    let orchestrator = Orchestrator::new(
        store.clone() as Arc<dyn SessionStore>,
        generator.clone(),
        prober.clone(),
        synthesizer.clone(),
    )
    .with_fanout(fanout);

    Harness {
        orchestrator: Arc::new(orchestrator),
        store,
        generator,
        prober,
        synthesizer,
    }
}

type Route = (&'static str, Result<String, BackendError>);

/// Backend answering by the first marker found in the prompt
pub struct RoutedBackend {
    routes: Vec<Route>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl RoutedBackend {
    pub fn new(routes: Vec<(&'static str, Result<&str, BackendError>)>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|(marker, reply)| (marker, reply.map(str::to_string)))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for RoutedBackend {
    fn name(&self) -> &str {
        "routed"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError> {
        let reply = self
            .routes
            .iter()
            .find(|(marker, _)| request.prompt.contains(marker))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| {
                Err(BackendError::MalformedResponse(format!(
                    "no route for prompt: {}",
                    request.prompt
                )))
            });
        self.requests.lock().unwrap().push(request);
        reply
    }
}
