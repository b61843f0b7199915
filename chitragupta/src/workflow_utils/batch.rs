//! Batch execution utilities for parallel task processing

use futures::{stream::FuturesUnordered, Future, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Context provided to each task in a batch
#[derive(Debug, Clone, Copy)]
pub struct TaskContext {
    /// Phase number (for logging)
    pub phase: usize,
    /// Position of the item in the input (0-based)
    pub index: usize,
    /// Task number (1-indexed for display)
    pub task_number: usize,
    /// Total number of tasks in this batch
    pub total_tasks: usize,
}

/// Execute items concurrently with a concurrency cap
///
/// # Arguments
/// - `phase`: Phase number for context
/// - `items`: Items to process
/// - `max_concurrency`: Maximum number of tasks running at once (0 is treated as 1)
/// - `cancel`: Once cancelled, tasks that have not started are skipped; started tasks run to the end
/// - `task_executor`: Function that processes each item, receives (item, context)
///
/// # Returns
/// One slot per input item, in input order regardless of completion order.
/// A slot is `None` only when its task was skipped because of cancellation.
///
/// # Error Handling
/// None here: every task runs to completion and its output, success or not, is
/// kept. Executors that can fail should return a `Result`.
pub async fn execute_batch<T, F, Fut, R>(
    phase: usize,
    items: Vec<T>,
    max_concurrency: usize,
    cancel: &CancellationToken,
    task_executor: F,
) -> Vec<Option<R>>
where
    T: Send,
    R: Send,
    F: Fn(T, TaskContext) -> Fut + Sync,
    Fut: Future<Output = R> + Send,
{
    let total = items.len();
    let sem = Semaphore::new(max_concurrency.max(1));
    let executor = &task_executor;
    let sem = &sem;
    let mut tasks = FuturesUnordered::new();

    for (idx, item) in items.into_iter().enumerate() {
        let ctx = TaskContext {
            phase,
            index: idx,
            task_number: idx + 1,
            total_tasks: total,
        };

        tasks.push(async move {
            // Wait for a permit unless the batch is cancelled first
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = sem.acquire() => permit.ok(),
            };

            let Some(_permit) = permit else {
                return (idx, None);
            };
            if cancel.is_cancelled() {
                return (idx, None);
            }

            (idx, Some(executor(item, ctx).await))
        });
    }

    // Slots are filled by index as tasks finish
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((idx, result)) = tasks.next().await {
        slots[idx] = result;
    }

    slots
}
