use crate::task::TaskExecutionError;
use audita_types::ExecutionStatus;
use serde::{Deserialize, Serialize};

/// Per-task execution metrics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub duration_ms: u64,
    pub attempts: u32,
    pub retries: u32,
    /// `None` when the task never started.
    pub worker_id: Option<usize>,
}

/// Outcome of one pooled task, stored at its submission index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<O> {
    pub task_id: String,
    pub index: usize,
    pub status: ExecutionStatus,
    pub output: Option<O>,
    pub error: Option<TaskExecutionError>,
    /// Abort reason or timeout detail for interrupted tasks.
    pub detail: Option<String>,
    pub metrics: TaskMetrics,
}

impl<O> TaskResult<O> {
    pub(crate) fn success(task_id: String, index: usize, output: O, metrics: TaskMetrics) -> Self {
        Self {
            task_id,
            index,
            status: ExecutionStatus::Success,
            output: Some(output),
            error: None,
            detail: None,
            metrics,
        }
    }

    pub(crate) fn failed(
        task_id: String,
        index: usize,
        message: String,
        metrics: TaskMetrics,
    ) -> Self {
        let error = TaskExecutionError {
            task_id: task_id.clone(),
            attempts: metrics.attempts,
            message,
        };
        Self {
            task_id,
            index,
            status: ExecutionStatus::Failed,
            output: None,
            error: Some(error),
            detail: None,
            metrics,
        }
    }

    pub(crate) fn interrupted(
        task_id: String,
        index: usize,
        status: ExecutionStatus,
        detail: String,
        metrics: TaskMetrics,
    ) -> Self {
        Self {
            task_id,
            index,
            status,
            output: None,
            error: None,
            detail: Some(detail),
            metrics,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }
}
