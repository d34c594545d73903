#![deny(unsafe_code)]
//! # audita-pool
//!
//! Deterministic bounded worker pool.
//!
//! Results come back in submission order regardless of worker count or
//! completion order, so a pure job yields identical output with one worker
//! or many. Task failures are isolated: retryable errors are retried with
//! backoff, timeouts and fatal errors are recorded, and the batch continues.
//!
//! ## Key Types
//!
//! - [`WorkerPool`]: Runs a batch of [`PoolTask`]s
//! - [`Job`]: Async unit of work (see [`job_fn`] for sync closures)
//! - [`AbortSignal`]: Cooperative cancellation shared with the orchestrator
//! - [`TaskResult`]: Per-task outcome at its submission index
//! - [`PoolMetrics`]: Aggregated batch metrics

pub mod abort;
pub mod config;
pub mod metrics;
pub mod pool;
pub mod result;
pub mod task;

pub use abort::AbortSignal;
pub use config::{BackoffPolicy, PoolConfig};
pub use metrics::PoolMetrics;
pub use pool::WorkerPool;
pub use result::{TaskMetrics, TaskResult};
pub use task::{
    job_fn, tasks_from_inputs, FnJob, Job, PoolTask, TaskContext, TaskError, TaskExecutionError,
};
