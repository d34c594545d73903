//! End-to-end test: refusal, snapshot and cardinality gates.
//!
//! Each gate ends the run FAILED with a structured reason naming the phase
//! and clause, and no later phase executes.

use audita_contracts::{RefusalClause, RefusalPolicy};
use audita_orchestrator::{
    AbortReason, OrchestratorConfig, PhaseId, RunContext, RunStatus, SimulatedExecutor,
};
use audita_tests::{document, orchestrator, run_context, sigma, CORRELATION, POLICY_UNIT};
use audita_types::ExecutionStatus;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn refusal_clause(reason: Option<AbortReason>) -> (PhaseId, RefusalClause) {
    match reason {
        Some(AbortReason::Refusal { phase, error }) => (phase, error.clause),
        other => panic!("expected a refusal, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_alpha_is_refused_after_configuration() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION).with_sigma(sigma());
    let report = orch.run(&document(), &ctx).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(orch.status(), RunStatus::Failed);
    assert_eq!(report.phases.len(), 1);
    assert_eq!(report.phases[0].status, ExecutionStatus::Failed);
    assert_eq!(
        refusal_clause(report.abort_reason),
        (PhaseId(1), RefusalClause::AlphaBound)
    );
}

#[tokio::test]
async fn alpha_outside_bound_is_refused() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION)
        .with_alpha(0.9)
        .with_sigma(sigma());
    let report = orch.run(&document(), &ctx).await.unwrap();
    assert_eq!(refusal_clause(report.abort_reason).1, RefusalClause::AlphaBound);
}

#[tokio::test]
async fn mandatory_fields_are_checked_first() {
    let mut config = OrchestratorConfig::default();
    config.refusal = RefusalPolicy {
        mandatory_fields: vec!["policy_unit_id".into(), "municipality".into()],
        ..RefusalPolicy::default()
    };
    let orch = orchestrator(config.clone(), SimulatedExecutor::new(), 4);
    // Alpha is also missing, but fields come first.
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION).with_sigma(sigma());
    let report = orch.run(&document(), &ctx).await.unwrap();
    let (_, clause) = refusal_clause(report.abort_reason.clone());
    assert_eq!(clause, RefusalClause::MandatoryFields);
    assert!(report.abort_reason.unwrap().to_string().contains("municipality"));

    let orch = orchestrator(config, SimulatedExecutor::new(), 4);
    let ctx = run_context().with_field("municipality", "Ejemplo");
    assert!(orch.run(&document(), &ctx).await.unwrap().is_completed());
}

#[tokio::test]
async fn missing_sigma_is_refused_at_configuration() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION).with_alpha(0.1);
    let report = orch.run(&document(), &ctx).await.unwrap();
    assert_eq!(
        refusal_clause(report.abort_reason),
        (PhaseId(1), RefusalClause::SigmaPresent)
    );
}

#[tokio::test]
async fn snapshot_gate_stops_before_micro_questions() {
    let mut config = OrchestratorConfig::default();
    config.refusal.require_sigma = false;
    let orch = orchestrator(config, SimulatedExecutor::new(), 4);
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION).with_alpha(0.1);
    let report = orch.run(&document(), &ctx).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phases.len(), 3);
    assert!(report.phases[..2].iter().all(|p| p.is_success()));
    match report.abort_reason {
        Some(AbortReason::Snapshot { phase, error }) => {
            assert_eq!(phase, PhaseId(3));
            assert_eq!(error.clause, RefusalClause::Snapshot);
            assert!(error.message.contains("standards_hash"));
        }
        other => panic!("expected a snapshot failure, got {:?}", other),
    }
    // No micro-question evidence was produced.
    assert!(report.phases[2].evidence.is_empty());
}

#[tokio::test]
async fn incomplete_sigma_fails_the_snapshot_gate() {
    let mut config = OrchestratorConfig::default();
    config.refusal.require_sigma = false;
    let orch = orchestrator(config, SimulatedExecutor::new(), 4);
    let ctx = RunContext::new(POLICY_UNIT, CORRELATION)
        .with_alpha(0.1)
        .with_sigma(audita_types::Sigma::new("std", "", "idx"));
    let report = orch.run(&document(), &ctx).await.unwrap();
    assert!(matches!(
        report.abort_reason,
        Some(AbortReason::Snapshot { phase: PhaseId(3), .. })
    ));
}

#[tokio::test]
async fn snapshot_digest_is_recorded_on_success() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 2);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    let micro = report.phase(PhaseId(3)).unwrap();
    assert_eq!(micro.metadata["sigma_digest"], sigma().digest().to_hex());
}

#[tokio::test]
async fn cardinality_mismatch_warns_by_default() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 5);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    assert!(report.is_completed());
    let config_phase = &report.phases[0];
    assert_eq!(config_phase.metadata["question_count"], 5);
    assert_eq!(config_phase.metadata["method_count"], 13);
    assert_eq!(config_phase.instrumentation.warnings.len(), 2);
}

#[tokio::test]
async fn strict_cardinality_fails_the_run() {
    let orch = orchestrator(OrchestratorConfig::strict(), SimulatedExecutor::new(), 5);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phases.len(), 1);
    assert!(matches!(
        report.abort_reason,
        Some(AbortReason::Cardinality { phase: PhaseId(1), expected: 305, actual: 5, .. })
    ));
}

#[tokio::test]
async fn strict_cardinality_passes_when_counts_match() {
    let mut config = OrchestratorConfig::strict();
    config.limits.expected_question_count = Some(5);
    config.limits.expected_method_count = Some(13);
    let orch = orchestrator(config, SimulatedExecutor::new(), 5);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    assert!(report.is_completed(), "{:?}", report.abort_reason);
    assert!(report.phases[0].instrumentation.warnings.is_empty());
}
