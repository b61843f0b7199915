//! Workflow orchestration
//!
//! The [`Orchestrator`] drives one run through
//! `Created -> Generating -> ProbingFanOut -> Synthesizing -> Completed`,
//! or into `Aborted(stage)` when Generate or Synthesize fails. Probe failures
//! never abort a run; they are carried to Synthesize as `Failure` results.
//!
//! Every transition is written to the run's session before the next stage
//! starts, and every run executes inside a `workflow_run` tracing span.

use crate::fanout::FanOutExecutor;
use crate::runtime::{ExecutionRegistry, ExecutionStatus};
use crate::session::SessionStore;
use chitragupta_sdk::{
    async_trait, context_keys, log_phase_complete, log_phase_failed, log_phase_start,
    log_state_updated, Generator, Prober, RunLogger, RunOutcome, RunState, Session, SessionError,
    SessionId, SessionSummary, StageName, Synthesizer, WorkItem, WorkResult, WorkflowError,
    WorkflowLog, WorkflowRun, WorkflowRuntime,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Sequences the three stages of a red-team run
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn Generator>,
    prober: Arc<dyn Prober>,
    synthesizer: Arc<dyn Synthesizer>,
    fanout: FanOutExecutor,
    executions: ExecutionRegistry,
}

/// Per-run handles threaded through the stages
struct RunContext<'a> {
    id: SessionId,
    logger: &'a RunLogger,
    cancel: &'a CancellationToken,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn Generator>,
        prober: Arc<dyn Prober>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            store,
            generator,
            prober,
            synthesizer,
            fanout: FanOutExecutor::default(),
            executions: ExecutionRegistry::new(),
        }
    }

    pub fn with_fanout(mut self, fanout: FanOutExecutor) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn executions(&self) -> &ExecutionRegistry {
        &self.executions
    }

    /// Run a workflow to its terminal state
    ///
    /// Stage failures are reported in `WorkflowRun::outcome`. The only error
    /// is the run's own session failing underneath it (evicted mid-run, or a
    /// context value that cannot be stored).
    ///
    /// Dropping the returned future before it resolves abandons the run: the
    /// session is moved to `Aborted` at the stage it was in.
    pub async fn start(&self, target: &str, count: usize) -> Result<WorkflowRun, SessionError> {
        let created = self.store.create().await;
        if let Some(evicted) = created.evicted {
            self.executions.remove(&evicted);
        }
        let id = created.id;
        let (logger, cancel) = self.executions.register(id);
        let mut guard = AbandonGuard {
            id,
            store: self.store.clone(),
            executions: self.executions.clone(),
            logger: logger.clone(),
            armed: true,
        };
        let span = info_span!("workflow_run", session_id = %id, target_model = %target);

        let ctx = RunContext {
            id,
            logger: &logger,
            cancel: &cancel,
        };
        let run = self.drive(&ctx, target, count).instrument(span).await;
        guard.armed = false;

        let status = match &run {
            Ok(WorkflowRun {
                outcome: RunOutcome::Completed { .. },
                ..
            }) => ExecutionStatus::Completed,
            _ => ExecutionStatus::Aborted,
        };
        if let Err(e @ SessionError::Serialization { .. }) = &run {
            if let Err(mark_err) =
                mark_aborted(self.store.as_ref(), &id, &logger, e.to_string()).await
            {
                warn!(session_id = %id, error = %mark_err, "Could not mark session aborted");
            }
        }
        self.executions.finish(&id, status);

        run
    }

    /// Run a workflow and collapse it into the report or one abort reason
    pub async fn run_workflow(&self, target: &str, count: usize) -> Result<String, WorkflowError> {
        self.start(target, count).await?.into_result()
    }

    /// Drop finished sessions and their execution state
    pub async fn cleanup(&self) -> usize {
        let removed = self.store.cleanup_terminal().await;
        for id in &removed {
            self.executions.remove(id);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "Cleaned up finished sessions");
        }
        removed.len()
    }

    async fn drive(
        &self,
        ctx: &RunContext<'_>,
        target: &str,
        count: usize,
    ) -> Result<WorkflowRun, SessionError> {
        info!(count, "Starting red-team workflow");
        self.store_value(ctx, None, context_keys::TARGET, &target)
            .await?;

        // Stage 1: Generate
        self.enter(ctx, StageName::Generating).await?;
        let personas = match self.generator.generate(ctx.logger, target, count).await {
            Ok(personas) => personas,
            Err(e) => {
                return self
                    .abort(ctx, StageName::Generating, Vec::new(), Vec::new(), e.to_string())
                    .await
            }
        };

        let items: Vec<WorkItem> = personas
            .into_iter()
            .enumerate()
            .map(|(index, persona)| WorkItem::new(index, persona, target))
            .collect();
        info!(personas = items.len(), "Personas generated");
        self.store_value(ctx, Some(StageName::Generating), context_keys::WORK_ITEMS, &items)
            .await?;
        log_phase_complete!(ctx.logger, StageName::Generating);

        // Stage 2: Fan-out probes. Never fails as a whole.
        self.enter(ctx, StageName::ProbingFanOut).await?;
        let results = self
            .fanout
            .run(ctx.logger, self.prober.as_ref(), items.clone(), ctx.cancel)
            .await;
        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some probes failed");
        }
        self.store_value(
            ctx,
            Some(StageName::ProbingFanOut),
            context_keys::WORK_RESULTS,
            &results,
        )
        .await?;
        log_phase_complete!(ctx.logger, StageName::ProbingFanOut);

        // Stage 3: Synthesize
        self.enter(ctx, StageName::Synthesizing).await?;
        let report = match self
            .synthesizer
            .synthesize(ctx.logger, target, &results)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                return self
                    .abort(ctx, StageName::Synthesizing, items, results, e.to_string())
                    .await
            }
        };
        log_phase_complete!(ctx.logger, StageName::Synthesizing);

        let outcome = RunOutcome::Completed { report };
        self.store_value(ctx, Some(StageName::Synthesizing), context_keys::OUTCOME, &outcome)
            .await?;
        self.store.set_stage(&ctx.id, RunState::Completed).await?;
        info!("Workflow complete");

        Ok(WorkflowRun {
            session_id: ctx.id,
            items,
            results,
            outcome,
        })
    }

    async fn enter(&self, ctx: &RunContext<'_>, stage: StageName) -> Result<(), SessionError> {
        self.store.set_stage(&ctx.id, stage.into()).await?;
        log_phase_start!(ctx.logger, stage);
        Ok(())
    }

    async fn abort(
        &self,
        ctx: &RunContext<'_>,
        stage: StageName,
        items: Vec<WorkItem>,
        results: Vec<WorkResult>,
        reason: String,
    ) -> Result<WorkflowRun, SessionError> {
        error!(stage = %stage, reason = %reason, "Workflow aborted");
        log_phase_failed!(ctx.logger, stage, &reason);

        let outcome = RunOutcome::Aborted { stage, reason };
        self.store_value(ctx, Some(stage), context_keys::OUTCOME, &outcome)
            .await?;
        self.store
            .set_stage(&ctx.id, RunState::Aborted { at_stage: stage })
            .await?;

        Ok(WorkflowRun {
            session_id: ctx.id,
            items,
            results,
            outcome,
        })
    }

    /// Write one context key, announcing it on the run log when a stage owns it
    async fn store_value<T: Serialize + ?Sized>(
        &self,
        ctx: &RunContext<'_>,
        stage: Option<StageName>,
        key: &str,
        value: &T,
    ) -> Result<(), SessionError> {
        let value = serde_json::to_value(value).map_err(|e| SessionError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.update(&ctx.id, key, value).await?;
        if let Some(stage) = stage {
            log_state_updated!(ctx.logger, stage, key);
        }
        Ok(())
    }
}

const ABANDONED_REASON: &str = "run abandoned before completion";

/// Move a non-terminal session to `Aborted` at its current stage
async fn mark_aborted(
    store: &dyn SessionStore,
    id: &SessionId,
    logger: &RunLogger,
    reason: String,
) -> Result<(), SessionError> {
    let session = store.get(id).await?;
    let Some(stage) = session.stage.stage() else {
        return Ok(());
    };

    log_phase_failed!(logger, stage, &reason);
    let outcome = RunOutcome::Aborted { stage, reason };
    let value = serde_json::to_value(&outcome).map_err(|e| SessionError::Serialization {
        key: context_keys::OUTCOME.to_string(),
        reason: e.to_string(),
    })?;
    store.update(id, context_keys::OUTCOME, value).await?;
    store
        .set_stage(id, RunState::Aborted { at_stage: stage })
        .await
}

/// Armed while a run is being driven. If the run's future is dropped first,
/// the run is finished as aborted instead of staying mid-stage forever.
struct AbandonGuard {
    id: SessionId,
    store: Arc<dyn SessionStore>,
    executions: ExecutionRegistry,
    logger: RunLogger,
    armed: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(session_id = %self.id, "Run dropped before reaching a terminal state");
        self.executions.finish(&self.id, ExecutionStatus::Aborted);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let id = self.id;
        let store = self.store.clone();
        let logger = self.logger.clone();
        handle.spawn(async move {
            if let Err(e) =
                mark_aborted(store.as_ref(), &id, &logger, ABANDONED_REASON.to_string()).await
            {
                warn!(session_id = %id, error = %e, "Could not mark abandoned session");
            }
        });
    }
}

#[async_trait]
impl WorkflowRuntime for Orchestrator {
    async fn execute_workflow(
        &self,
        target: &str,
        count: usize,
    ) -> Result<WorkflowRun, SessionError> {
        self.start(target, count).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.store.get(id).await
    }

    async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    async fn evict_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let session = self.store.evict(id).await?;
        self.executions.remove(id);
        Ok(session)
    }

    async fn get_logs(&self, id: &SessionId) -> Result<Vec<WorkflowLog>, SessionError> {
        self.executions.logs(id)
    }

    async fn subscribe_logs(
        &self,
        id: &SessionId,
    ) -> Result<broadcast::Receiver<WorkflowLog>, SessionError> {
        self.executions.subscribe(id)
    }

    async fn cancel_workflow(&self, id: &SessionId) -> Result<(), SessionError> {
        self.executions.cancel(id)
    }

    async fn cleanup_sessions(&self) -> usize {
        self.cleanup().await
    }
}
