//! Context Immutability: the per-question context handed to executors is
//! frozen at construction and digests identically however it is rebuilt.
//!
//! Fields are private and only reachable through shared references, so
//! neither top-level nor nested mutation is expressible once built.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{content_hash, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionContext {
    question_mapping: BTreeMap<String, Value>,
    standards: BTreeMap<String, Value>,
    required_evidence_types: Vec<String>,
    search_queries: Vec<String>,
    validation_criteria: BTreeMap<String, Value>,
    traceability_id: String,
}

impl QuestionContext {
    pub fn new(
        question_mapping: BTreeMap<String, Value>,
        standards: BTreeMap<String, Value>,
        required_evidence_types: Vec<String>,
        search_queries: Vec<String>,
        validation_criteria: BTreeMap<String, Value>,
        traceability_id: impl Into<String>,
    ) -> Self {
        Self {
            question_mapping,
            standards,
            required_evidence_types,
            search_queries,
            validation_criteria,
            traceability_id: traceability_id.into(),
        }
    }

    pub fn question_mapping(&self) -> &BTreeMap<String, Value> {
        &self.question_mapping
    }

    pub fn standards(&self) -> &BTreeMap<String, Value> {
        &self.standards
    }

    pub fn required_evidence_types(&self) -> &[String] {
        &self.required_evidence_types
    }

    pub fn search_queries(&self) -> &[String] {
        &self.search_queries
    }

    pub fn validation_criteria(&self) -> &BTreeMap<String, Value> {
        &self.validation_criteria
    }

    pub fn traceability_id(&self) -> &str {
        &self.traceability_id
    }

    /// `question_mapping["id"]` when it is a string.
    pub fn question_id(&self) -> Option<&str> {
        self.question_mapping.get("id").and_then(Value::as_str)
    }

    /// BLAKE3 over the canonical JSON form.
    pub fn canonical_digest(&self) -> Result<ContentHash, ContractError> {
        Ok(content_hash(self)?)
    }
}

/// A context to check, optionally against a previously recorded digest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextProbe {
    pub context: QuestionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_digest: Option<ContentHash>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContextImmutabilityContract;

impl ContextImmutabilityContract {
    pub fn verify_context(probe: &ContextProbe) -> Result<ContractCertificate, ContractError> {
        let ctx = &probe.context;
        let first = ctx.canonical_digest()?;
        let second = ctx.canonical_digest()?;

        let json = serde_json::to_string(ctx).map_err(|e| ContractError::Serialization(e.to_string()))?;
        let rebuilt: QuestionContext =
            serde_json::from_str(&json).map_err(|e| ContractError::Serialization(e.to_string()))?;
        let rebuilt_digest = rebuilt.canonical_digest()?;

        let mut builder = CertificateBuilder::new(ContractKind::Context, inputs_digest(probe)?)
            .check(first == second, "digest_stable", || {
                "repeated digests of the same context differ".into()
            })
            .check(rebuilt_digest == first, "rebuild_invariant", || {
                format!("rebuilt context digests to {}, expected {}", rebuilt_digest, first)
            });
        if let Some(expected) = probe.expected_digest {
            builder = builder.check(expected == first, "expected_digest", || {
                format!("context digest {} differs from recorded {}", first, expected)
            });
        }

        Ok(builder
            .field("context_hash", &first)
            .field("question_id", &ctx.question_id())
            .field("trace_id", ctx.traceability_id())
            .field("evidence_types", ctx.required_evidence_types())
            .field("queries", ctx.search_queries())
            .field("standards_present", &!ctx.standards().is_empty())
            .seal())
    }
}

#[async_trait]
impl Contract for ContextImmutabilityContract {
    type Input = ContextProbe;

    fn kind(&self) -> ContractKind {
        ContractKind::Context
    }

    async fn verify(&self, input: &ContextProbe) -> Result<ContractCertificate, ContractError> {
        Self::verify_context(input)
    }
}
