use crate::result::TaskResult;
use audita_types::ExecutionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate metrics for one pool batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub tasks_total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: usize,
    pub timed_out: usize,
    pub total_retries: u64,
    pub wall_ms: u64,
    /// Sum of task durations. Exceeds `wall_ms` when workers overlap.
    pub busy_ms: u64,
    /// Tasks executed per worker id.
    pub per_worker: BTreeMap<usize, usize>,
}

impl PoolMetrics {
    pub fn from_results<O>(results: &[TaskResult<O>], wall_ms: u64) -> Self {
        let mut metrics = Self {
            tasks_total: results.len(),
            wall_ms,
            ..Self::default()
        };
        for result in results {
            match result.status {
                ExecutionStatus::Success => metrics.succeeded += 1,
                ExecutionStatus::Failed => metrics.failed += 1,
                ExecutionStatus::Aborted => metrics.aborted += 1,
                ExecutionStatus::TimedOut => metrics.timed_out += 1,
            }
            metrics.total_retries += u64::from(result.metrics.retries);
            metrics.busy_ms += result.metrics.duration_ms;
            if let Some(worker) = result.metrics.worker_id {
                *metrics.per_worker.entry(worker).or_default() += 1;
            }
        }
        metrics
    }

    /// Fraction of tasks that did not succeed.
    pub fn failure_ratio(&self) -> f64 {
        if self.tasks_total == 0 {
            return 0.0;
        }
        (self.tasks_total - self.succeeded) as f64 / self.tasks_total as f64
    }
}
