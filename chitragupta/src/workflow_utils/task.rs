//! Task execution utilities with automatic logging

use crate::workflow_utils::batch::TaskContext;
use chitragupta_sdk::{log_task_complete, log_task_failed, log_task_start, RunLogger};
use std::fmt::Display;
use std::future::Future;

/// Execute a single task with automatic logging
///
/// Wraps task execution with:
/// - `TaskStarted` before execution
/// - `TaskCompleted` on success
/// - `TaskFailed` on error
///
/// # Arguments
/// - `logger`: Run the task belongs to
/// - `task_id`: Unique identifier for this task within the run
/// - `description`: Human-readable description
/// - `ctx`: Task context (phase, task number, total)
/// - `executor`: Async function that performs the work and returns (result, summary_message)
///
/// # Example
/// ```rust,ignore
/// let findings = execute_task(&logger, "probe_1", "Probe as persona 1", ctx, || async {
///     let findings = prober.probe(&logger, &item).await?;
///     let summary = format!("{} chars", findings.len());
///     Ok((findings, summary))
/// })
/// .await?;
/// ```
pub async fn execute_task<F, Fut, R, E>(
    logger: &RunLogger,
    task_id: impl Into<String>,
    description: impl Into<String>,
    ctx: TaskContext,
    executor: F,
) -> Result<R, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(R, String), E>>,
    E: Display,
{
    let task_id = task_id.into();
    let description = description.into();

    log_task_start!(logger, ctx.phase, &task_id, &description, ctx.total_tasks);

    match executor().await {
        Ok((result, summary)) => {
            log_task_complete!(logger, &task_id, summary);
            Ok(result)
        }
        Err(e) => {
            log_task_failed!(logger, &task_id, e);
            Err(e)
        }
    }
}
