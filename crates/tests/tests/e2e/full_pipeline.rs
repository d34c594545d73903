//! End-to-end test: a full eleven-phase run over the reference plan.
//!
//! Verifies completion, provenance linkage and replay, and that the final
//! registry state does not depend on the worker count.

use audita_orchestrator::{
    CalibrationRegistry, OrchestratorConfig, ParameterBundle, PhaseId, RunStatus,
    SimulatedExecutor,
};
use audita_pool::PoolConfig;
use audita_tests::{document, orchestrator, run_context};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reference_run_completes_every_phase() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 8);
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.abort_reason.is_none());
    assert_eq!(report.phases.len(), 11);
    for (i, phase) in report.phases.iter().enumerate() {
        assert_eq!(phase.phase, PhaseId(i as u8 + 1));
        assert!(phase.is_success(), "{} failed: {:?}", phase.phase, phase.error);
        assert_eq!(phase.evidence.len(), phase.tasks_total);
        assert_eq!(phase.instrumentation.items_processed, phase.tasks_total);
    }
    // 8 answers + 8 scores + 1 + 2 + 6 + 10 + 4 + 1 + 4 + 1 + 2, plus the document root.
    assert_eq!(report.evidence_count, 48);
    assert_eq!(report.duplicate_count, 0);
    assert_eq!(report.sigma_digest, Some(audita_tests::sigma().digest()));
}

#[tokio::test]
async fn synchronous_phases_run_inline() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    for phase in &report.phases {
        let expected_sync = matches!(phase.phase.0, 1 | 2 | 7 | 8 | 10);
        assert_eq!(phase.synchronous, expected_sync, "{}", phase.phase);
        assert_eq!(phase.pool.is_some(), !expected_sync, "{}", phase.phase);
    }
}

#[tokio::test]
async fn every_node_replays_and_links_to_the_root() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    let registry = orch.registry();

    for node in registry.nodes().unwrap() {
        assert!(registry.verify_replay(&node), "replay failed for {}", node.output_hash);
        if node.output_hash == report.root_evidence {
            assert!(node.input_hashes.is_empty());
        } else {
            assert!(!node.input_hashes.is_empty());
        }
    }

    let export = report.phase(PhaseId(11)).unwrap().evidence[0];
    let ancestors = registry.ancestors(&export).unwrap();
    assert!(ancestors.contains(&report.root_evidence));
    for hash in &report.phase(PhaseId(3)).unwrap().evidence {
        assert!(ancestors.contains(hash));
    }
}

#[tokio::test]
async fn state_digest_independent_of_worker_count() {
    let mut sequential = OrchestratorConfig::default();
    sequential.pool = PoolConfig::sequential();
    let mut parallel = OrchestratorConfig::default();
    parallel.pool = PoolConfig::default().with_workers(8);

    let a = orchestrator(sequential, SimulatedExecutor::new(), 10)
        .run(&document(), &run_context())
        .await
        .unwrap();
    let b = orchestrator(parallel, SimulatedExecutor::new(), 10)
        .run(&document(), &run_context())
        .await
        .unwrap();

    assert_eq!(a.state_digest, b.state_digest);
    for (pa, pb) in a.phases.iter().zip(&b.phases) {
        assert_eq!(pa.evidence, pb.evidence, "{}", pa.phase);
    }
}

#[tokio::test]
async fn calibration_bundle_reaches_the_executor() {
    let baseline = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 3)
        .run(&document(), &run_context())
        .await
        .unwrap();

    let calibration = CalibrationRegistry::new().with_bundle(
        ParameterBundle::new("micro.answer", "v2").with_parameter("confidence", 0.8),
    );
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 3);
    let calibrated = orch
        .run(&document(), &run_context().with_calibration(calibration))
        .await
        .unwrap();

    assert!(calibrated.is_completed());
    assert_ne!(baseline.state_digest, calibrated.state_digest);
    let answer = calibrated.phase(PhaseId(3)).unwrap().evidence[0];
    let evidence = orch.registry().get(&answer).unwrap().unwrap();
    assert_eq!(evidence.confidence, 0.8);
    assert_eq!(evidence.content["parameters_version"], "v2");
}

#[tokio::test]
async fn seeds_are_derived_once_per_invocation() {
    let ctx = run_context();
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 6);
    orch.run(&document(), &ctx).await.unwrap();
    assert_eq!(ctx.seeds().len(), 43);
    assert_eq!(ctx.seeds().audit_log().len(), 43);
}

#[tokio::test]
async fn report_serializes_with_tagged_status() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 2);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
    assert_eq!(json["status"]["state"], "COMPLETED");
    assert_eq!(json["phases"].as_array().unwrap().len(), 11);
    assert_eq!(json["state_digest"], report.state_digest.to_hex());
}

#[tokio::test]
async fn second_run_on_same_registry_only_adds_duplicates() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    let first = orch.run(&document(), &run_context()).await.unwrap();
    let second = orch.run(&document(), &run_context()).await.unwrap();
    assert!(second.is_completed());
    assert_eq!(first.state_digest, second.state_digest);
    assert_eq!(first.evidence_count, second.evidence_count);
    assert_eq!(second.duplicate_count as usize, first.evidence_count);
}
