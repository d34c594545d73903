use crate::calibration::ParameterBundle;
use crate::error::ExecutorError;
use crate::phase::PhaseId;
use async_trait::async_trait;
use audita_pool::{AbortSignal, Job, TaskContext, TaskError};
use audita_types::{content_hash, ContentHash, Evidence, EvidenceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Method id under which the document root evidence is recorded.
pub const DOCUMENT_ROOT_METHOD: &str = "document.root";

/// The policy document under evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn content_hash(&self) -> ContentHash {
        content_hash(self).expect("serializable")
    }

    /// Evidence standing for the document itself; the provenance root of a run.
    pub fn root_evidence(&self) -> Result<Evidence, EvidenceError> {
        Evidence::simple(
            json!({
                "document_id": self.id,
                "document_hash": self.content_hash(),
            }),
            1.0,
        )
    }
}

/// One planned call to a method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocation {
    pub method_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl MethodInvocation {
    pub fn new(method_id: impl Into<String>) -> Self {
        Self {
            method_id: method_id.into(),
            question_id: None,
            payload: Value::Null,
        }
    }

    pub fn for_question(mut self, question_id: impl Into<String>) -> Self {
        self.question_id = Some(question_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Everything one invocation may depend on.
#[derive(Clone, Debug)]
pub struct MethodContext {
    pub run_id: Uuid,
    pub phase: PhaseId,
    pub index: usize,
    pub invocation: MethodInvocation,
    pub parameters: ParameterBundle,
    pub seed: u32,
    /// Provenance inputs the produced evidence will be linked to.
    pub inputs: Vec<ContentHash>,
    abort: AbortSignal,
}

impl MethodContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        phase: PhaseId,
        index: usize,
        invocation: MethodInvocation,
        parameters: ParameterBundle,
        seed: u32,
        inputs: Vec<ContentHash>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            run_id,
            phase,
            index,
            invocation,
            parameters,
            seed,
            inputs,
            abort,
        }
    }

    pub fn method_id(&self) -> &str {
        &self.invocation.method_id
    }

    pub fn task_id(&self) -> String {
        match &self.invocation.question_id {
            Some(q) => format!("{}:{}:{}", self.phase, self.invocation.method_id, q),
            None => format!("{}:{}:{}", self.phase, self.invocation.method_id, self.index),
        }
    }

    pub fn checkpoint(&self) -> Result<(), ExecutorError> {
        if self.abort.is_aborted() {
            return Err(ExecutorError::Aborted(self.abort.reason().unwrap_or_default()));
        }
        Ok(())
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }
}

/// Runs one analytical method over the document.
#[async_trait]
pub trait MethodExecutor: Send + Sync {
    async fn execute(
        &self,
        document: &Document,
        context: &MethodContext,
    ) -> Result<Evidence, ExecutorError>;
}

/// Adapts a [`MethodExecutor`] to the pool's [`Job`] interface.
pub(crate) struct InvocationJob {
    pub(crate) executor: Arc<dyn MethodExecutor>,
    pub(crate) document: Arc<Document>,
}

#[async_trait]
impl Job<MethodContext, Evidence> for InvocationJob {
    async fn run(&self, input: MethodContext, ctx: &TaskContext) -> Result<Evidence, TaskError> {
        ctx.checkpoint()?;
        self.executor
            .execute(&self.document, &input)
            .await
            .map_err(TaskError::from)
    }
}

/// Deterministic stand-in for the analytical methods.
///
/// Emits evidence derived from the invocation, seed and parameter bundle.
/// Confidence comes from the bundle's `confidence` parameter (default 1.0).
#[derive(Clone, Debug, Default)]
pub struct SimulatedExecutor {
    failing: BTreeSet<String>,
    latency: Option<Duration>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations of `method_id` fail permanently.
    pub fn failing(mut self, method_id: impl Into<String>) -> Self {
        self.failing.insert(method_id.into());
        self
    }

    /// Sleep before each invocation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl MethodExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        document: &Document,
        context: &MethodContext,
    ) -> Result<Evidence, ExecutorError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        context.checkpoint()?;
        if self.failing.contains(context.method_id()) {
            return Err(ExecutorError::Failed(format!(
                "method '{}' is configured to fail",
                context.method_id()
            )));
        }
        let confidence = context.parameters.get_f64("confidence").unwrap_or(1.0);
        let evidence = Evidence::simple(
            json!({
                "phase": context.phase,
                "method_id": context.method_id(),
                "question_id": context.invocation.question_id,
                "payload": context.invocation.payload,
                "document_hash": document.content_hash(),
                "seed": context.seed,
                "parameters_version": context.parameters.version,
            }),
            confidence,
        )?
        .with_metadata("method_id", json!(context.method_id()));
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(method: &str, abort: AbortSignal) -> MethodContext {
        MethodContext::new(
            Uuid::new_v4(),
            PhaseId(3),
            0,
            MethodInvocation::new(method).for_question("Q001"),
            ParameterBundle::new(method, "v1"),
            7,
            Vec::new(),
            abort,
        )
    }

    #[tokio::test]
    async fn simulated_output_is_deterministic() {
        let doc = Document::new("doc-1", "plan de desarrollo");
        let exec = SimulatedExecutor::new();
        let a = exec.execute(&doc, &context("micro.answer", AbortSignal::new())).await.unwrap();
        let b = exec.execute(&doc, &context("micro.answer", AbortSignal::new())).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn configured_failure() {
        let doc = Document::new("doc-1", "x");
        let exec = SimulatedExecutor::new().failing("micro.answer");
        let err = exec
            .execute(&doc, &context("micro.answer", AbortSignal::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Failed(_)));
    }

    #[tokio::test]
    async fn checkpoint_observes_abort() {
        let abort = AbortSignal::new();
        abort.abort("operator");
        let doc = Document::new("doc-1", "x");
        let err = SimulatedExecutor::new()
            .execute(&doc, &context("micro.answer", abort))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Aborted("operator".into()));
    }

    #[test]
    fn task_ids_name_question_or_index() {
        let ctx = context("micro.answer", AbortSignal::new());
        assert_eq!(ctx.task_id(), "P03:micro.answer:Q001");
        let mut other = ctx.clone();
        other.invocation.question_id = None;
        assert_eq!(other.task_id(), "P03:micro.answer:0");
    }

    #[test]
    fn root_evidence_tracks_document() {
        let a = Document::new("d", "text").root_evidence().unwrap();
        let b = Document::new("d", "other").root_evidence().unwrap();
        assert_ne!(a.id, b.id);
    }
}
