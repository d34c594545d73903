//! Canned inputs for each contract probe.
//!
//! Inputs are fixed (or derived from [`ProbeSettings`]) so every probe's
//! certificate is byte-reproducible across invocations.

use crate::config::ProbeSettings;
use audita_contracts::{
    synthetic_scores, AlignmentInput, AlignmentItem, AlignmentParams, AlignmentStabilityContract,
    BudgetInput, BudgetMonotonicityContract, ComplianceInput, ComplianceRules,
    ConcurrencyDeterminismContract, ContextImmutabilityContract, ContextProbe, Contract,
    ContractCertificate, ContractError, ContractKind, DeterminismProbe, FailureFallbackContract,
    FallbackInput, IdempotencyContract, IdempotencyInput, IndexVariant, IndexedDoc, LexicalRetriever,
    MonotoneComplianceContract, OrderingInput, QuestionContext, RefusalContext, RefusalContract,
    RefusalPolicy, RetrievalProbe, RetrieverContract, RiskCertificateContract, RiskInput,
    RouteCandidate, RoutingContract, RoutingInputs, SnapshotContract, TotalOrderingContract,
    TraceInput, TraceabilityContract,
};
use audita_pool::{job_fn, TaskError};
use audita_types::{content_hash, Sigma};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Run one contract's probe and return its certificate.
pub async fn run_probe(
    kind: ContractKind,
    settings: &ProbeSettings,
) -> Result<ContractCertificate, ContractError> {
    tracing::debug!(contract = %kind, seed = settings.seed, "Running probe");
    match kind {
        ContractKind::Budget => BudgetMonotonicityContract.verify(&budget_input()).await,
        ContractKind::Idempotency => IdempotencyContract.verify(&idempotency_input()).await,
        ContractKind::Refusal => {
            RefusalContract::new(RefusalPolicy::default())
                .verify(&refusal_context(settings))
                .await
        }
        ContractKind::Ordering => TotalOrderingContract.verify(&ordering_input()).await,
        ContractKind::Traceability => TraceabilityContract.verify(&trace_input()).await,
        ContractKind::Fallback => {
            FailureFallbackContract
                .verify(&FallbackInput {
                    fallback: json!({ "status": "degraded", "score": 0.0 }),
                    runs: 3,
                })
                .await
        }
        ContractKind::Compliance => MonotoneComplianceContract.verify(&compliance_input()).await,
        ContractKind::Concurrency => {
            ConcurrencyDeterminismContract::new(settings.workers)
                .verify(&determinism_probe())
                .await
        }
        ContractKind::Risk => {
            RiskCertificateContract::default()
                .verify(&RiskInput {
                    calibration: synthetic_scores(settings.samples, settings.seed),
                    holdout: synthetic_scores(settings.samples, settings.seed.wrapping_add(1)),
                    alpha: settings.alpha,
                    seed: settings.seed,
                })
                .await
        }
        ContractKind::Snapshot => SnapshotContract.verify(&sigma().to_map()).await,
        ContractKind::Retriever => {
            RetrieverContract::new(settings.retrieval_k)
                .verify(&retrieval_probe()?)
                .await
        }
        ContractKind::Routing => RoutingContract.verify(&routing_inputs(settings)).await,
        ContractKind::Alignment => AlignmentStabilityContract.verify(&alignment_input()).await,
        ContractKind::Context => {
            ContextImmutabilityContract
                .verify(&ContextProbe {
                    context: question_context(),
                    expected_digest: None,
                })
                .await
        }
    }
}

fn sigma() -> Sigma {
    Sigma::new("standards-2024.1", "corpus-2024.1", "index-2024.1")
}

fn budget_input() -> BudgetInput {
    let items = [("m-a", 1.0), ("m-b", 2.0), ("m-c", 2.0), ("m-d", 3.5), ("m-e", 5.0)]
        .into_iter()
        .map(|(id, cost)| (id.to_string(), cost))
        .collect();
    BudgetInput {
        items,
        budgets: vec![3.0, 5.0, 10.0],
    }
}

fn idempotency_input() -> IdempotencyInput {
    IdempotencyInput {
        items: vec![
            json!({ "question": "Q001", "answer": "yes" }),
            json!({ "question": "Q002", "answer": "partial" }),
            json!({ "question": "Q003", "answer": "no" }),
        ],
        readds: 5,
    }
}

fn refusal_context(settings: &ProbeSettings) -> RefusalContext {
    RefusalContext::default()
        .with_field("policy_unit_id", "PU-PROBE")
        .with_alpha(settings.alpha)
        .with_sigma(sigma())
}

fn ordering_input() -> OrderingInput {
    OrderingInput {
        items: vec![
            json!({ "score": 10, "id": "b" }),
            json!({ "score": 10, "id": "a" }),
            json!({ "score": 5, "id": "c" }),
        ],
        key_field: "score".into(),
        tie_break_field: Some("id".into()),
    }
}

fn trace_input() -> TraceInput {
    TraceInput {
        trail: (1..=8)
            .map(|i| json!({ "step": i, "method": format!("method-{:02}", i) }))
            .collect(),
        expected_root: None,
    }
}

fn compliance_input() -> ComplianceInput {
    let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
    ComplianceInput {
        rules: ComplianceRules::new(["budget", "indicators", "baseline"], ["budget"]),
        evidence: set(&["budget"]),
        extended: set(&["budget", "indicators", "baseline"]),
    }
}

fn determinism_probe() -> DeterminismProbe {
    let job = job_fn(|input: Value, _ctx| {
        let digest = content_hash(&input).map_err(|e| TaskError::Fatal(e.to_string()))?;
        Ok(json!({ "input": input, "digest": digest }))
    });
    DeterminismProbe {
        job,
        inputs: (0..32).map(|i| json!({ "item": i })).collect(),
    }
}

fn retrieval_probe() -> Result<RetrievalProbe, ContractError> {
    let doc = |id: &str, text: &str, sector: &str| IndexedDoc {
        id: id.into(),
        text: text.into(),
        attributes: BTreeMap::from([("sector".to_string(), sector.to_string())]),
    };
    let retriever = LexicalRetriever::new(vec![
        doc("std-01", "budget allocation for rural water programmes", "water"),
        doc("std-02", "baseline indicators for water quality", "water"),
        doc("std-03", "education budget execution targets", "education"),
        doc("std-04", "water infrastructure budget and indicators", "water"),
    ]);
    let index_hash = retriever.index_hash()?.to_hex();
    let revised = retriever.with_doc(doc(
        "std-05",
        "water tariff indicators and budget transfers",
        "water",
    ));
    let variant = IndexVariant {
        index_hash: revised.index_hash()?.to_hex(),
        retriever: Arc::new(revised),
    };
    Ok(RetrievalProbe {
        retriever: Arc::new(retriever),
        query: "water budget indicators".into(),
        filters: BTreeMap::from([("sector".to_string(), "water".to_string())]),
        index_hash,
        variant: Some(variant),
    })
}

fn routing_inputs(settings: &ProbeSettings) -> RoutingInputs {
    let candidate = |id: &str, score: f64, cost: f64| RouteCandidate {
        id: id.into(),
        score,
        cost,
    };
    RoutingInputs {
        context_hash: "ctx-probe".into(),
        theta: 0.5,
        sigma: sigma(),
        budget: 5.0,
        seed: settings.seed,
        candidates: vec![
            candidate("m-alpha", 0.9, 2.0),
            candidate("m-zeta", 0.9, 2.0),
            candidate("m-beta", 0.7, 4.0),
            candidate("m-cheap", 0.6, 1.0),
            candidate("m-low", 0.2, 0.5),
        ],
    }
}

fn alignment_input() -> AlignmentInput {
    let item = |id: &str, vector: &[f64]| AlignmentItem {
        id: id.into(),
        vector: vector.to_vec(),
    };
    AlignmentInput {
        sections: vec![
            item("sec-diagnosis", &[1.0, 0.2, 0.0]),
            item("sec-budget", &[0.1, 1.0, 0.3]),
            item("sec-indicators", &[0.0, 0.3, 1.0]),
        ],
        standards: vec![
            item("std-diagnosis", &[0.9, 0.1, 0.0]),
            item("std-finance", &[0.0, 1.0, 0.2]),
            item("std-monitoring", &[0.1, 0.2, 0.9]),
        ],
        params: AlignmentParams::default(),
    }
}

fn question_context() -> QuestionContext {
    QuestionContext::new(
        BTreeMap::from([
            ("question_id".to_string(), json!("Q001")),
            ("dimension".to_string(), json!("D01")),
            ("policy_area".to_string(), json!("PA01")),
        ]),
        BTreeMap::from([("standards_hash".to_string(), json!("standards-2024.1"))]),
        vec!["quantitative".into(), "budgetary".into()],
        vec!["baseline water coverage".into()],
        BTreeMap::from([("min_confidence".to_string(), json!(0.7))]),
        "trace-Q001",
    )
}
