use crate::abort::AbortSignal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error returned by a job attempt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Transient failure; the pool retries up to `max_retries`.
    #[error("retryable: {0}")]
    Retryable(String),
    /// Permanent failure; recorded immediately.
    #[error("fatal: {0}")]
    Fatal(String),
    /// The job observed the abort signal and stopped.
    #[error("aborted: {0}")]
    Aborted(String),
}

/// A pooled task failed permanently. Recorded on its `TaskResult`; never
/// propagated out of the batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("task '{task_id}' failed after {attempts} attempt(s): {message}")]
pub struct TaskExecutionError {
    pub task_id: String,
    pub attempts: u32,
    pub message: String,
}

/// Per-attempt view handed to a job.
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub task_id: String,
    /// Submission index of the task within its batch.
    pub index: usize,
    /// 1-based attempt number.
    pub attempt: u32,
    pub worker_id: usize,
    abort: AbortSignal,
}

impl TaskContext {
    pub fn new(
        task_id: impl Into<String>,
        index: usize,
        attempt: u32,
        worker_id: usize,
        abort: AbortSignal,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            index,
            attempt,
            worker_id,
            abort,
        }
    }

    /// Cooperative abort point for long-running jobs.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.abort.is_aborted() {
            let reason = self.abort.reason().unwrap_or_default();
            return Err(TaskError::Aborted(reason));
        }
        Ok(())
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }
}

/// A unit of pooled work. Implementations must be pure with respect to their
/// input for the pool's determinism guarantee to hold.
#[async_trait]
pub trait Job<I, O>: Send + Sync {
    async fn run(&self, input: I, ctx: &TaskContext) -> Result<O, TaskError>;
}

/// Adapter running a synchronous closure on the blocking thread pool.
pub struct FnJob<F> {
    f: Arc<F>,
}

#[async_trait]
impl<I, O, F> Job<I, O> for FnJob<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, &TaskContext) -> Result<O, TaskError> + Send + Sync + 'static,
{
    async fn run(&self, input: I, ctx: &TaskContext) -> Result<O, TaskError> {
        let f = Arc::clone(&self.f);
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || f(input, &ctx))
            .await
            .map_err(|e| TaskError::Fatal(format!("job panicked: {}", e)))?
    }
}

/// Wrap a synchronous function as a shareable [`Job`].
pub fn job_fn<I, O, F>(f: F) -> Arc<dyn Job<I, O>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, &TaskContext) -> Result<O, TaskError> + Send + Sync + 'static,
{
    Arc::new(FnJob { f: Arc::new(f) })
}

/// One submission: identifier, job and input.
pub struct PoolTask<I, O> {
    pub id: String,
    pub job: Arc<dyn Job<I, O>>,
    pub input: I,
}

impl<I, O> PoolTask<I, O> {
    pub fn new(id: impl Into<String>, job: Arc<dyn Job<I, O>>, input: I) -> Self {
        Self {
            id: id.into(),
            job,
            input,
        }
    }
}

/// Build one task per input sharing a single job. Ids are `task-<index>`.
pub fn tasks_from_inputs<I, O>(job: Arc<dyn Job<I, O>>, inputs: Vec<I>) -> Vec<PoolTask<I, O>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| PoolTask::new(format!("task-{}", i), Arc::clone(&job), input))
        .collect()
}
