use crate::abort::AbortSignal;
use crate::config::PoolConfig;
use crate::metrics::PoolMetrics;
use crate::result::{TaskMetrics, TaskResult};
use crate::task::{PoolTask, TaskContext, TaskError};
use audita_types::ExecutionStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};

/// Bounded worker pool with index-stable output.
///
/// `max_workers` loops pull submission indices from a shared cursor and write
/// each result into a pre-sized buffer at that index, so the returned vector
/// is in submission order whatever the completion order or worker count.
pub struct WorkerPool {
    config: PoolConfig,
    abort: AbortSignal,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            abort: AbortSignal::new(),
        }
    }

    /// Share an externally owned abort signal with the pool.
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Execute a batch and return results in submission order.
    pub async fn run<I, O>(&self, tasks: Vec<PoolTask<I, O>>) -> Vec<TaskResult<O>>
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        self.run_with_metrics(tasks).await.0
    }

    /// Execute a batch, returning results and aggregate metrics.
    pub async fn run_with_metrics<I, O>(
        &self,
        tasks: Vec<PoolTask<I, O>>,
    ) -> (Vec<TaskResult<O>>, PoolMetrics)
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        let started = Instant::now();
        let total = tasks.len();
        let workers = self.config.effective_workers().min(total.max(1));
        tracing::debug!(tasks = total, workers, "Pool batch starting");

        let tasks = Arc::new(tasks);
        let cursor = Arc::new(AtomicUsize::new(0));
        let slots: Arc<Mutex<Vec<Option<TaskResult<O>>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let tasks = Arc::clone(&tasks);
            let cursor = Arc::clone(&cursor);
            let slots = Arc::clone(&slots);
            let config = self.config.clone();
            let abort = self.abort.clone();
            set.spawn(async move {
                loop {
                    if abort.is_aborted() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(task) = tasks.get(index) else {
                        break;
                    };
                    let result = execute_task(task, index, worker_id, &config, &abort).await;
                    let mut guard = slots.lock().unwrap_or_else(|p| p.into_inner());
                    guard[index] = Some(result);
                }
            });
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Pool worker terminated abnormally");
            }
        }

        let slots = {
            let mut guard = slots.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        let reason = self
            .abort
            .reason()
            .unwrap_or_else(|| "worker terminated".to_string());
        let results: Vec<TaskResult<O>> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    TaskResult::interrupted(
                        tasks[index].id.clone(),
                        index,
                        ExecutionStatus::Aborted,
                        format!("not started: {}", reason),
                        TaskMetrics::default(),
                    )
                })
            })
            .collect();

        let metrics = PoolMetrics::from_results(&results, elapsed_ms(started));
        tracing::info!(
            tasks = metrics.tasks_total,
            succeeded = metrics.succeeded,
            failed = metrics.failed,
            aborted = metrics.aborted,
            timed_out = metrics.timed_out,
            retries = metrics.total_retries,
            wall_ms = metrics.wall_ms,
            "Pool batch finished"
        );
        (results, metrics)
    }
}

async fn execute_task<I, O>(
    task: &PoolTask<I, O>,
    index: usize,
    worker_id: usize,
    config: &PoolConfig,
    abort: &AbortSignal,
) -> TaskResult<O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    let started = Instant::now();
    let metrics = |attempts: u32| TaskMetrics {
        duration_ms: elapsed_ms(started),
        attempts,
        retries: attempts.saturating_sub(1),
        worker_id: Some(worker_id),
    };
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if abort.is_aborted() {
            let reason = abort.reason().unwrap_or_default();
            return TaskResult::interrupted(
                task.id.clone(),
                index,
                ExecutionStatus::Aborted,
                format!("aborted before attempt {}: {}", attempt, reason),
                metrics(attempt - 1),
            );
        }

        let ctx = TaskContext::new(task.id.clone(), index, attempt, worker_id, abort.clone());
        let job = Arc::clone(&task.job);
        let input = task.input.clone();
        let mut attempt_task = AttemptTask(tokio::spawn(async move { job.run(input, &ctx).await }));
        let handle = &mut attempt_task.0;

        let joined = match config.per_task_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut *handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    let limit_ms = limit.as_millis() as u64;
                    tracing::warn!(task_id = %task.id, index, limit_ms, "Task timed out");
                    return TaskResult::interrupted(
                        task.id.clone(),
                        index,
                        ExecutionStatus::TimedOut,
                        format!("exceeded per-task timeout of {}ms", limit_ms),
                        metrics(attempt),
                    );
                }
            },
            None => handle.await,
        };
        let outcome =
            joined.unwrap_or_else(|e| Err(TaskError::Fatal(format!("job panicked: {}", e))));

        match outcome {
            Ok(output) => {
                tracing::trace!(task_id = %task.id, index, worker_id, attempt, "Task succeeded");
                return TaskResult::success(task.id.clone(), index, output, metrics(attempt));
            }
            Err(TaskError::Retryable(message)) if attempt <= config.max_retries => {
                let delay = config.backoff.delay(attempt);
                tracing::debug!(
                    task_id = %task.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Retrying task"
                );
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = abort.cancelled() => {}
                    }
                }
            }
            Err(TaskError::Aborted(reason)) => {
                return TaskResult::interrupted(
                    task.id.clone(),
                    index,
                    ExecutionStatus::Aborted,
                    reason,
                    metrics(attempt),
                );
            }
            Err(err) => {
                tracing::warn!(task_id = %task.id, index, attempt, error = %err, "Task failed");
                return TaskResult::failed(task.id.clone(), index, err.to_string(), metrics(attempt));
            }
        }
    }
}

/// Spawned job attempt, aborted when the awaiting worker is dropped.
struct AttemptTask<T>(JoinHandle<T>);

impl<T> Drop for AttemptTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
