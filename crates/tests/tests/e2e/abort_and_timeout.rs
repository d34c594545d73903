//! End-to-end test: abort requests, phase timeouts and failure tolerance.
//!
//! Abort and timeout end the run ABORTED; exceeding the failed-task ratio
//! ends it FAILED unless the phase is skippable.

use audita_orchestrator::{
    AbortReason, OrchestratorConfig, OrchestratorError, PhaseId, RunStatus, SimulatedExecutor,
};
use audita_tests::{document, orchestrator, run_context, AbortingExecutor};
use audita_types::ExecutionStatus;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn abort_before_start_runs_no_phase() {
    let orch = orchestrator(OrchestratorConfig::default(), SimulatedExecutor::new(), 4);
    orch.request_abort("maintenance window");
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert!(report.phases.is_empty());
    assert_eq!(
        report.abort_reason,
        Some(AbortReason::Requested {
            phase: PhaseId(1),
            reason: "maintenance window".into()
        })
    );
    // Only the document root was recorded.
    assert_eq!(report.evidence_count, 1);
}

#[tokio::test]
async fn abort_during_pooled_phase_discards_its_output() {
    let orch = orchestrator(
        OrchestratorConfig::default(),
        AbortingExecutor::new("micro.score"),
        6,
    );
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(orch.status(), RunStatus::Aborted);
    assert_eq!(report.phases.len(), 4);
    let scoring = report.phase(PhaseId(4)).unwrap();
    assert_eq!(scoring.status, ExecutionStatus::Aborted);
    assert!(scoring.evidence.is_empty());
    match report.abort_reason {
        Some(AbortReason::Requested { phase, reason }) => {
            assert_eq!(phase, PhaseId(4));
            assert_eq!(reason, "stop at micro.score");
        }
        other => panic!("expected an abort, got {:?}", other),
    }
}

#[tokio::test]
async fn abort_during_synchronous_phase() {
    let orch = orchestrator(
        OrchestratorConfig::default(),
        AbortingExecutor::new("ingest.normalize"),
        3,
    );
    let report = orch.run(&document(), &run_context()).await.unwrap();
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.phases.len(), 2);
    assert!(matches!(
        report.abort_reason,
        Some(AbortReason::Requested { phase: PhaseId(2), .. })
    ));
}

#[tokio::test]
async fn abort_from_another_task_interrupts_the_run() {
    let config = OrchestratorConfig::default();
    let orch = Arc::new(orchestrator(
        config,
        SimulatedExecutor::new().with_latency(Duration::from_millis(50)),
        8,
    ));
    let signal = orch.abort_signal();
    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run(&document(), &run_context()).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    signal.abort("operator");
    let report = runner.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Aborted);
    assert!(report.phases.len() < 11);
}

#[tokio::test]
async fn concurrent_run_is_rejected() {
    let orch = Arc::new(orchestrator(
        OrchestratorConfig::default(),
        SimulatedExecutor::new().with_latency(Duration::from_millis(30)),
        2,
    ));
    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run(&document(), &run_context()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = orch.run(&document(), &run_context()).await;
    assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));
    assert!(first.await.unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn phase_timeout_aborts_the_run() {
    let config = OrchestratorConfig::default().with_phase_timeout(5, Duration::from_millis(25));
    let orch = orchestrator(
        config,
        SimulatedExecutor::new().with_latency(Duration::from_millis(150)),
        2,
    );
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.phases.len(), 5);
    let dims = report.phase(PhaseId(5)).unwrap();
    assert_eq!(dims.status, ExecutionStatus::TimedOut);
    assert_eq!(dims.instrumentation.errors[0].category, "timeout");
    assert_eq!(
        report.abort_reason,
        Some(AbortReason::PhaseTimeout {
            phase: PhaseId(5),
            timeout_ms: 25
        })
    );
}

#[tokio::test]
async fn failed_ratio_above_limit_fails_required_phase() {
    let orch = orchestrator(
        OrchestratorConfig::default(),
        SimulatedExecutor::new().failing("aggregate.policy_area"),
        3,
    );
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let areas = report.phase(PhaseId(6)).unwrap();
    assert_eq!(areas.tasks_failed, 10);
    assert!(!areas.skipped);
    match report.abort_reason {
        Some(AbortReason::FailureThreshold { phase, ratio, limit }) => {
            assert_eq!(phase, PhaseId(6));
            assert_eq!(ratio, 1.0);
            assert_eq!(limit, 0.5);
        }
        other => panic!("expected a threshold failure, got {:?}", other),
    }
}

#[tokio::test]
async fn skippable_phase_failure_does_not_stop_the_run() {
    let orch = orchestrator(
        OrchestratorConfig::default(),
        SimulatedExecutor::new().failing("recommend.generate"),
        3,
    );
    let report = orch.run(&document(), &run_context()).await.unwrap();

    assert!(report.is_completed());
    let recs = report.phase(PhaseId(9)).unwrap();
    assert!(recs.skipped);
    assert_eq!(recs.status, ExecutionStatus::Failed);
    assert_eq!(recs.instrumentation.warnings.last().unwrap().category, "skipped");
    assert!(report.phase(PhaseId(10)).unwrap().is_success());
    assert!(report.phase(PhaseId(11)).unwrap().is_success());
}

#[tokio::test]
async fn tolerated_failures_stay_within_ratio() {
    let mut config = OrchestratorConfig::default();
    config.limits.max_failed_ratio = 0.6;
    // Half of the ingest tasks fail: 0.5 <= 0.6.
    let orch = orchestrator(config, SimulatedExecutor::new().failing("ingest.chunk"), 2);
    let report = orch.run(&document(), &run_context()).await.unwrap();
    assert!(report.is_completed());
    let ingest = report.phase(PhaseId(2)).unwrap();
    assert_eq!(ingest.tasks_failed, 1);
    assert_eq!(ingest.evidence.len(), 1);
}
