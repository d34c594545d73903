//! Concurrency Determinism: a job run through the pool with one worker and
//! with many must produce the same result sequence.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_pool::{tasks_from_inputs, Job, PoolConfig, TaskResult, WorkerPool};
use audita_types::{content_hash, ContentHash, ExecutionStatus};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Serialize)]
struct ResultView<'a, O> {
    index: usize,
    task_id: &'a str,
    status: ExecutionStatus,
    output: Option<&'a O>,
}

/// Canonical hash of a result sequence: index, id, status and output only.
/// Timings and worker ids are excluded.
pub fn results_digest<O: Serialize>(results: &[TaskResult<O>]) -> Result<ContentHash, ContractError> {
    let view: Vec<ResultView<'_, O>> = results
        .iter()
        .map(|r| ResultView {
            index: r.index,
            task_id: &r.task_id,
            status: r.status,
            output: r.output.as_ref(),
        })
        .collect();
    Ok(content_hash(&view)?)
}

/// A job and the inputs to run it over.
pub struct DeterminismProbe {
    pub job: Arc<dyn Job<Value, Value>>,
    pub inputs: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct ConcurrencyDeterminismContract {
    workers: usize,
}

impl Default for ConcurrencyDeterminismContract {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl ConcurrencyDeterminismContract {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(2),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `inputs` through `job` with 1 worker, then with `workers`, and
    /// compare canonical result hashes.
    pub async fn verify_determinism<I, O>(
        &self,
        job: Arc<dyn Job<I, O>>,
        inputs: Vec<I>,
    ) -> Result<ContractCertificate, ContractError>
    where
        I: Serialize + Clone + Send + Sync + 'static,
        O: Serialize + Send + 'static,
    {
        let digest = inputs_digest(&inputs)?;

        let sequential = WorkerPool::new(PoolConfig::sequential())
            .run(tasks_from_inputs(Arc::clone(&job), inputs.clone()))
            .await;
        let parallel = WorkerPool::new(PoolConfig::sequential().with_workers(self.workers))
            .run(tasks_from_inputs(job, inputs))
            .await;

        let sequential_hash = results_digest(&sequential)?;
        let parallel_hash = results_digest(&parallel)?;
        let first_difference = sequential
            .iter()
            .zip(parallel.iter())
            .position(|(a, b)| a.status != b.status);

        tracing::debug!(
            workers = self.workers,
            tasks = sequential.len(),
            sequential = %sequential_hash,
            parallel = %parallel_hash,
            "Determinism check complete"
        );

        Ok(CertificateBuilder::new(ContractKind::Concurrency, digest)
            .check(sequential_hash == parallel_hash, "worker_count_invariant", || {
                match first_difference {
                    Some(i) => format!("status differs at index {} between 1 and {} workers", i, self.workers),
                    None => format!("outputs differ between 1 and {} workers", self.workers),
                }
            })
            .field("workers", &self.workers)
            .field("task_count", &sequential.len())
            .field("sequential_hash", &sequential_hash)
            .field("parallel_hash", &parallel_hash)
            .seal())
    }
}

#[async_trait]
impl Contract for ConcurrencyDeterminismContract {
    type Input = DeterminismProbe;

    fn kind(&self) -> ContractKind {
        ContractKind::Concurrency
    }

    async fn verify(&self, input: &DeterminismProbe) -> Result<ContractCertificate, ContractError> {
        self.verify_determinism(Arc::clone(&input.job), input.inputs.clone())
            .await
    }
}
