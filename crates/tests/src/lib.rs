//! Shared fixtures for the end-to-end and property suites.

use async_trait::async_trait;
use audita_orchestrator::{
    Document, ExecutorError, MethodContext, MethodExecutor, Orchestrator, OrchestratorConfig,
    RunContext, SimulatedExecutor, StaticPlan,
};
use audita_types::{Evidence, Sigma};
use std::sync::Arc;

pub const POLICY_UNIT: &str = "PU-0001";
pub const CORRELATION: &str = "corr-e2e";

pub fn sigma() -> Sigma {
    Sigma::new("standards-v3", "corpus-v3", "index-v3")
}

/// A context that passes every gate.
pub fn run_context() -> RunContext {
    RunContext::new(POLICY_UNIT, CORRELATION)
        .with_alpha(0.1)
        .with_sigma(sigma())
}

pub fn document() -> Document {
    Document::new(
        "plan-municipal-2024",
        "Plan de desarrollo: agua potable, educación y presupuesto participativo.",
    )
    .with_metadata("municipality", "Ejemplo")
}

pub fn orchestrator(
    config: OrchestratorConfig,
    executor: impl MethodExecutor + 'static,
    questions: usize,
) -> Orchestrator {
    Orchestrator::new(
        config,
        Arc::new(StaticPlan::reference(questions)),
        Arc::new(executor),
    )
    .expect("valid orchestrator config")
}

/// Requests an abort when it reaches `trigger`, then behaves like the
/// simulated executor (which observes the abort at its checkpoint).
pub struct AbortingExecutor {
    pub trigger: String,
    pub inner: SimulatedExecutor,
}

impl AbortingExecutor {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            inner: SimulatedExecutor::new(),
        }
    }
}

#[async_trait]
impl MethodExecutor for AbortingExecutor {
    async fn execute(
        &self,
        document: &Document,
        context: &MethodContext,
    ) -> Result<Evidence, ExecutorError> {
        if context.method_id() == self.trigger {
            context.abort_signal().abort(format!("stop at {}", self.trigger));
        }
        self.inner.execute(document, context).await
    }
}
