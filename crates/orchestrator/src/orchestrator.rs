use crate::config::OrchestratorConfig;
use crate::context::RunContext;
use crate::error::{ExecutorError, OrchestratorError};
use crate::executor::{Document, InvocationJob, MethodContext, MethodExecutor, DOCUMENT_ROOT_METHOD};
use crate::instrumentation::PhaseInstrumentation;
use crate::phase::{default_catalogue, validate_catalogue, PhaseSpec};
use crate::planner::PhasePlanner;
use crate::report::{AbortReason, PhaseResult, RunReport, RunStatus};
use audita_contracts::{RefusalContract, SnapshotContract};
use audita_evidence::{EvidenceRegistry, RegistryError};
use audita_pool::{AbortSignal, Job, PoolMetrics, PoolTask, TaskResult, WorkerPool};
use audita_types::{ContentHash, Evidence, ExecutionStatus};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Outcome of one invocation, pooled or inline.
struct Outcome {
    method_id: String,
    status: ExecutionStatus,
    evidence: Option<Evidence>,
    error: Option<String>,
    latency_ms: f64,
}

impl Outcome {
    fn inline(method_id: String, result: Result<Evidence, ExecutorError>, latency_ms: f64) -> Self {
        let (status, evidence, error) = match result {
            Ok(evidence) => (ExecutionStatus::Success, Some(evidence), None),
            Err(ExecutorError::Aborted(reason)) => (ExecutionStatus::Aborted, None, Some(reason)),
            Err(e) => (ExecutionStatus::Failed, None, Some(e.to_string())),
        };
        Self {
            method_id,
            status,
            evidence,
            error,
            latency_ms,
        }
    }

    fn pooled(method_id: String, result: TaskResult<Evidence>) -> Self {
        Self {
            method_id,
            status: result.status,
            latency_ms: result.metrics.duration_ms as f64,
            error: result.error.map(|e| e.to_string()).or(result.detail),
            evidence: result.output,
        }
    }
}

enum Batch {
    Finished {
        outcomes: Vec<Outcome>,
        pool: Option<PoolMetrics>,
    },
    TimedOut(Duration),
    Aborted,
}

/// What a phase did, before instrumentation is closed.
struct PhaseRun {
    status: ExecutionStatus,
    skipped: bool,
    tasks_total: usize,
    tasks_failed: usize,
    evidence: Vec<ContentHash>,
    error: Option<String>,
    pool: Option<PoolMetrics>,
    fatal: Option<AbortReason>,
}

impl PhaseRun {
    fn new(tasks_total: usize) -> Self {
        Self {
            status: ExecutionStatus::Success,
            skipped: false,
            tasks_total,
            tasks_failed: 0,
            evidence: Vec::new(),
            error: None,
            pool: None,
            fatal: None,
        }
    }

    fn stop(mut self, status: ExecutionStatus, reason: AbortReason) -> Self {
        self.status = status;
        self.error = Some(reason.to_string());
        self.fatal = Some(reason);
        self
    }
}

/// Sequences the phase catalogue over one document.
///
/// Phases run strictly in order. Pooled phases run under a timeout and the
/// abort signal; synchronous phases run inline. Every successful invocation's
/// evidence is recorded with the previous phase's evidence as provenance
/// inputs. Refusal, snapshot and provenance failures end the run FAILED;
/// timeouts and abort requests end it ABORTED.
pub struct Orchestrator {
    config: OrchestratorConfig,
    phases: Vec<PhaseSpec>,
    planner: Arc<dyn PhasePlanner>,
    executor: Arc<dyn MethodExecutor>,
    registry: EvidenceRegistry,
    refusal: RefusalContract,
    abort: AbortSignal,
    status: Mutex<RunStatus>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        planner: Arc<dyn PhasePlanner>,
        executor: Arc<dyn MethodExecutor>,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            refusal: RefusalContract::new(config.refusal.clone()),
            config,
            phases: default_catalogue(),
            planner,
            executor,
            registry: EvidenceRegistry::new(),
            abort: AbortSignal::new(),
            status: Mutex::new(RunStatus::Pending),
        })
    }

    pub fn with_phases(mut self, phases: Vec<PhaseSpec>) -> Result<Self, OrchestratorError> {
        validate_catalogue(&phases).map_err(OrchestratorError::InvalidCatalogue)?;
        self.phases = phases;
        Ok(self)
    }

    pub fn with_registry(mut self, registry: EvidenceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn registry(&self) -> &EvidenceRegistry {
        &self.registry
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Cooperative: checked at phase boundaries, by the pool and by executors.
    pub fn request_abort(&self, reason: impl Into<String>) {
        self.abort.abort(reason);
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, status: RunStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    /// Execute every phase over `document`.
    ///
    /// An abort requested before the first run applies to it; a signal raised
    /// during an earlier run is cleared when the next one starts. Returns `Ok` with the archived report whatever the run's outcome;
    /// `Err` only when the run cannot start or the registry is unusable.
    pub async fn run(
        &self,
        document: &Document,
        ctx: &RunContext,
    ) -> Result<RunReport, OrchestratorError> {
        {
            let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
            if matches!(*status, RunStatus::Running { .. }) {
                return Err(OrchestratorError::AlreadyRunning);
            }
            // A signal left over from the previous run must not stop this one.
            if status.is_terminal() {
                self.abort.reset();
            }
            *status = RunStatus::Running {
                phase: self.phases[0].id,
            };
        }
        let outcome = self.run_phases(document, ctx).await;
        match &outcome {
            Ok(report) => self.set_status(report.status),
            Err(_) => self.set_status(RunStatus::Failed),
        }
        outcome
    }

    async fn run_phases(
        &self,
        document: &Document,
        ctx: &RunContext,
    ) -> Result<RunReport, OrchestratorError> {
        let started_at = Utc::now();
        let run_id = ctx.run_id();
        tracing::info!(
            run_id = %run_id,
            policy_unit = ctx.policy_unit_id(),
            phases = self.phases.len(),
            "Run starting"
        );

        let root = self
            .registry
            .record(document.root_evidence()?, DOCUMENT_ROOT_METHOD, &[])?;
        let document = Arc::new(document.clone());
        let mut frontier = vec![root.output_hash];
        let mut phases = Vec::with_capacity(self.phases.len());
        let mut stop: Option<AbortReason> = None;

        for spec in &self.phases {
            if self.abort.is_aborted() {
                stop = Some(AbortReason::Requested {
                    phase: spec.id,
                    reason: self.abort.reason().unwrap_or_default(),
                });
                break;
            }
            self.set_status(RunStatus::Running { phase: spec.id });

            let (result, fatal) = self.execute_phase(spec, &document, ctx, &frontier).await;
            if result.is_success() && !result.evidence.is_empty() {
                frontier = result.evidence.clone();
            }
            phases.push(result);
            if fatal.is_some() {
                stop = fatal;
                break;
            }
        }

        let status = stop
            .as_ref()
            .map_or(RunStatus::Completed, AbortReason::run_status);
        match &stop {
            Some(reason) => {
                tracing::warn!(run_id = %run_id, status = %status, reason = %reason, "Run stopped")
            }
            None => tracing::info!(run_id = %run_id, phases = phases.len(), "Run completed"),
        }

        Ok(RunReport {
            run_id,
            policy_unit_id: ctx.policy_unit_id().to_string(),
            correlation_id: ctx.correlation_id().to_string(),
            status,
            abort_reason: stop,
            phases,
            sigma_digest: ctx.sigma().map(|s| s.digest()),
            root_evidence: root.output_hash,
            evidence_count: self.registry.len()?,
            duplicate_count: self.registry.duplicate_count(),
            state_digest: self.registry.state_digest()?,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn execute_phase(
        &self,
        spec: &PhaseSpec,
        document: &Arc<Document>,
        ctx: &RunContext,
        frontier: &[ContentHash],
    ) -> (PhaseResult, Option<AbortReason>) {
        let synchronous = self.config.is_synchronous(spec);
        let mut instr = PhaseInstrumentation::new(spec.id, self.config.limits.snapshot_interval);
        let mut metadata = BTreeMap::new();
        let run = self
            .drive_phase(spec, synchronous, document, ctx, frontier, &mut instr, &mut metadata)
            .await;

        let (started, finished, report) = instr.finish();
        let mut result = PhaseResult::new(spec, synchronous, started, finished, report);
        result.status = run.status;
        result.skipped = run.skipped;
        result.tasks_total = run.tasks_total;
        result.tasks_failed = run.tasks_failed;
        result.evidence = run.evidence;
        result.error = run.error;
        result.pool = run.pool;
        result.metadata = metadata;

        tracing::info!(
            phase = %spec.id,
            name = %spec.name,
            status = %result.status,
            evidence = result.evidence.len(),
            duration_ms = result.duration_ms,
            "Phase finished"
        );
        (result, run.fatal)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_phase(
        &self,
        spec: &PhaseSpec,
        synchronous: bool,
        document: &Arc<Document>,
        ctx: &RunContext,
        frontier: &[ContentHash],
        instr: &mut PhaseInstrumentation,
        metadata: &mut BTreeMap<String, Value>,
    ) -> PhaseRun {
        let invocations = self.planner.plan(spec, document);
        instr.start(invocations.len());
        tracing::info!(
            phase = %spec.id,
            name = %spec.name,
            tasks = invocations.len(),
            synchronous,
            "Phase starting"
        );
        let run = PhaseRun::new(invocations.len());

        if spec.requires_snapshot {
            let gate = match ctx.sigma() {
                Some(sigma) => SnapshotContract::verify_sigma(sigma),
                None => SnapshotContract::verify_snapshot(&BTreeMap::new()).map(|(_, digest)| digest),
            };
            match gate {
                Ok(digest) => {
                    metadata.insert("sigma_digest".into(), json!(digest));
                }
                Err(error) => {
                    instr.record_error("snapshot", error.to_string());
                    return run.stop(
                        ExecutionStatus::Failed,
                        AbortReason::Snapshot {
                            phase: spec.id,
                            error,
                        },
                    );
                }
            }
        }

        if spec.validates_cardinality {
            if let Some(reason) = self.check_cardinality(spec, document, instr, metadata) {
                return run.stop(ExecutionStatus::Failed, reason);
            }
        }

        let contexts: Vec<MethodContext> = invocations
            .into_iter()
            .enumerate()
            .map(|(index, invocation)| {
                let parameters = ctx.calibration().resolve(&invocation.method_id);
                let mut context = MethodContext::new(
                    ctx.run_id(),
                    spec.id,
                    index,
                    invocation,
                    parameters,
                    0,
                    frontier.to_vec(),
                    self.abort.clone(),
                );
                context.seed = ctx.seeds().seed_for(&context.task_id());
                context
            })
            .collect();

        let batch = if synchronous {
            self.run_inline(document, contexts).await
        } else {
            self.run_pooled(spec, document, contexts).await
        };
        self.settle(spec, ctx, frontier, batch, run, instr)
    }

    fn settle(
        &self,
        spec: &PhaseSpec,
        ctx: &RunContext,
        frontier: &[ContentHash],
        batch: Batch,
        mut run: PhaseRun,
        instr: &mut PhaseInstrumentation,
    ) -> PhaseRun {
        let (outcomes, pool) = match batch {
            Batch::TimedOut(limit) => {
                let timeout_ms = limit.as_millis() as u64;
                instr.record_error("timeout", format!("phase exceeded {}ms", timeout_ms));
                return run.stop(
                    ExecutionStatus::TimedOut,
                    AbortReason::PhaseTimeout {
                        phase: spec.id,
                        timeout_ms,
                    },
                );
            }
            Batch::Aborted => return self.aborted(spec, run, instr),
            Batch::Finished { outcomes, pool } => (outcomes, pool),
        };
        if self.abort.is_aborted() {
            return self.aborted(spec, run, instr);
        }
        run.pool = pool;

        let mut seen = BTreeSet::new();
        for outcome in outcomes {
            instr.record_item(outcome.latency_ms);
            let Some(evidence) = outcome.evidence else {
                run.tasks_failed += 1;
                let message = outcome.error.unwrap_or_else(|| outcome.status.to_string());
                instr.record_error("task", format!("{}: {}", outcome.method_id, message));
                continue;
            };
            match self.registry.record(evidence, &outcome.method_id, frontier) {
                Ok(node) => {
                    if seen.insert(node.output_hash) {
                        run.evidence.push(node.output_hash);
                    }
                }
                Err(RegistryError::Cycle(cycle)) => {
                    instr.record_error("provenance", cycle.to_string());
                    return run.stop(
                        ExecutionStatus::Failed,
                        AbortReason::Cycle {
                            phase: spec.id,
                            detail: cycle.to_string(),
                        },
                    );
                }
                Err(e) => {
                    instr.record_error("provenance", e.to_string());
                    return run.stop(
                        ExecutionStatus::Failed,
                        AbortReason::Registry {
                            phase: spec.id,
                            detail: e.to_string(),
                        },
                    );
                }
            }
        }

        let limit = self.config.limits.max_failed_ratio;
        if run.tasks_total > 0 {
            let ratio = run.tasks_failed as f64 / run.tasks_total as f64;
            if ratio > limit {
                let reason = AbortReason::FailureThreshold {
                    phase: spec.id,
                    ratio,
                    limit,
                };
                if spec.skippable {
                    tracing::warn!(phase = %spec.id, reason = %reason, "Skippable phase failed, continuing");
                    instr.record_warning("skipped", reason.to_string());
                    run.status = ExecutionStatus::Failed;
                    run.skipped = true;
                    run.error = Some(reason.to_string());
                    return run;
                }
                return run.stop(ExecutionStatus::Failed, reason);
            }
        }

        if spec.requires_prerequisites {
            if let Err(error) = self.refusal.check_prerequisites(&ctx.refusal_context()) {
                instr.record_error("refusal", error.to_string());
                return run.stop(
                    ExecutionStatus::Failed,
                    AbortReason::Refusal {
                        phase: spec.id,
                        error,
                    },
                );
            }
        }
        run
    }

    fn aborted(
        &self,
        spec: &PhaseSpec,
        run: PhaseRun,
        instr: &mut PhaseInstrumentation,
    ) -> PhaseRun {
        let reason = self.abort.reason().unwrap_or_default();
        instr.record_error("abort", reason.clone());
        run.stop(
            ExecutionStatus::Aborted,
            AbortReason::Requested {
                phase: spec.id,
                reason,
            },
        )
    }

    async fn run_inline(&self, document: &Document, contexts: Vec<MethodContext>) -> Batch {
        let mut outcomes = Vec::with_capacity(contexts.len());
        for context in contexts {
            if self.abort.is_aborted() {
                return Batch::Aborted;
            }
            let started = Instant::now();
            let result = self.executor.execute(document, &context).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            outcomes.push(Outcome::inline(context.method_id().to_string(), result, latency_ms));
        }
        Batch::Finished {
            outcomes,
            pool: None,
        }
    }

    async fn run_pooled(
        &self,
        spec: &PhaseSpec,
        document: &Arc<Document>,
        contexts: Vec<MethodContext>,
    ) -> Batch {
        let job: Arc<dyn Job<MethodContext, Evidence>> = Arc::new(InvocationJob {
            executor: Arc::clone(&self.executor),
            document: Arc::clone(document),
        });
        let method_ids: Vec<String> = contexts.iter().map(|c| c.method_id().to_string()).collect();
        let tasks: Vec<PoolTask<MethodContext, Evidence>> = contexts
            .into_iter()
            .map(|c| PoolTask::new(c.task_id(), Arc::clone(&job), c))
            .collect();
        let pool = WorkerPool::new(self.config.pool.clone()).with_abort_signal(self.abort.clone());
        let limit = self.config.timeout_for(spec);

        tokio::select! {
            (results, metrics) = pool.run_with_metrics(tasks) => {
                let outcomes = results
                    .into_iter()
                    .zip(method_ids)
                    .map(|(result, method_id)| Outcome::pooled(method_id, result))
                    .collect();
                Batch::Finished { outcomes, pool: Some(metrics) }
            }
            _ = tokio::time::sleep(limit) => {
                // Stops jobs that only observe the signal through checkpoints.
                self.abort.abort(format!(
                    "{} exceeded its timeout of {}ms",
                    spec.id,
                    limit.as_millis()
                ));
                Batch::TimedOut(limit)
            }
            _ = self.abort.cancelled() => Batch::Aborted,
        }
    }

    /// Compare planned question and method counts across the whole catalogue
    /// against the configured expectations.
    fn check_cardinality(
        &self,
        spec: &PhaseSpec,
        document: &Document,
        instr: &mut PhaseInstrumentation,
        metadata: &mut BTreeMap<String, Value>,
    ) -> Option<AbortReason> {
        let mut questions = BTreeSet::new();
        let mut methods = BTreeSet::new();
        for phase in &self.phases {
            for invocation in self.planner.plan(phase, document) {
                if let Some(q) = invocation.question_id {
                    questions.insert(q);
                }
                methods.insert(invocation.method_id);
            }
        }
        metadata.insert("question_count".into(), json!(questions.len()));
        metadata.insert("method_count".into(), json!(methods.len()));

        let limits = &self.config.limits;
        let checks = [
            ("questions", limits.expected_question_count, questions.len()),
            ("methods", limits.expected_method_count, methods.len()),
        ];
        let mut first_failure = None;
        for (item, expected, actual) in checks {
            let Some(expected) = expected else { continue };
            if expected == actual {
                continue;
            }
            let message = format!("expected {} {}, planned {}", expected, item, actual);
            let extra = BTreeMap::from([
                ("expected".to_string(), json!(expected)),
                ("found".to_string(), json!(actual)),
            ]);
            metadata.insert(
                format!("{}_mismatch", item),
                json!({ "expected": expected, "found": actual }),
            );
            if limits.strict_cardinality {
                instr.record_error_with("cardinality", message, extra);
                first_failure.get_or_insert(AbortReason::Cardinality {
                    phase: spec.id,
                    item: item.to_string(),
                    expected,
                    actual,
                });
            } else {
                instr.record_warning_with("cardinality", message, extra);
            }
        }
        first_failure
    }
}
