//! Fan-out executor: every work item probed concurrently, all outcomes kept

use crate::workflow_utils::{execute_batch, execute_task};
use chitragupta_sdk::{
    log_task_failed, ProbeError, Prober, RunLogger, StageName, WorkItem, WorkResult,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Runs a homogeneous batch of probes
///
/// Never fails as a whole: each item ends up as exactly one `WorkResult` at
/// its own index, whether it succeeded, failed, timed out or was skipped.
#[derive(Debug, Clone)]
pub struct FanOutExecutor {
    max_concurrency: usize,
    probe_timeout: Option<Duration>,
}

impl Default for FanOutExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl FanOutExecutor {
    /// A cap of 0 is raised to 1
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            probe_timeout: None,
        }
    }

    /// Bound every single probe by `timeout`
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout
    }

    /// Probe every item and return one result per item, in input order
    pub async fn run(
        &self,
        logger: &RunLogger,
        prober: &dyn Prober,
        items: Vec<WorkItem>,
        cancel: &CancellationToken,
    ) -> Vec<WorkResult> {
        let phase = StageName::ProbingFanOut.phase();
        let probe_timeout = self.probe_timeout;

        debug!(
            session_id = %logger.session_id(),
            items = items.len(),
            max_concurrency = self.max_concurrency,
            "Starting fan-out"
        );

        let slots = execute_batch(
            phase,
            items,
            self.max_concurrency,
            cancel,
            move |item, ctx| async move {
                let item = &item;
                let task_id = format!("probe_{}", ctx.task_number);
                let description = format!("Probe as '{}'", item.persona);

                let outcome = execute_task(
                    logger,
                    task_id,
                    description,
                    ctx,
                    move || async move {
                        let findings = match probe_timeout {
                            Some(limit) => tokio::time::timeout(limit, prober.probe(logger, item))
                                .await
                                .map_err(|_| ProbeError::Timeout)??,
                            None => prober.probe(logger, item).await?,
                        };
                        let summary = format!("{} chars of findings", findings.len());
                        Ok::<_, ProbeError>((findings, summary))
                    },
                )
                .await;

                match outcome {
                    Ok(findings) => WorkResult::success(findings),
                    Err(e) => WorkResult::failure(ctx.index, e.to_string()),
                }
            },
        )
        .await;

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    log_task_failed!(logger, format!("probe_{}", index + 1), ProbeError::Cancelled);
                    WorkResult::failure(index, ProbeError::Cancelled.to_string())
                })
            })
            .collect()
    }
}
