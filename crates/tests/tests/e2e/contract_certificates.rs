//! End-to-end test: contract verifiers and their certificate files.
//!
//! Each contract is exercised on the canonical scenario for its property,
//! and certificates written to disk are checked for byte reproducibility.

use audita_contracts::{
    execute_with_fallback, stable_sort_by, synthetic_scores, verify_trace,
    BudgetMonotonicityContract, ComplianceRules, ConcurrencyDeterminismContract, Contract,
    ContractCertificate, ContractError, ContractKind, DedupStore, MerkleTree,
    MonotoneComplianceContract, OrderingInput, RefusalClause, RiskCertificateContract, RiskInput,
    SnapshotContract, TotalOrderingContract,
};
use audita_pool::{job_fn, TaskError};
use audita_types::Label;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn risk_input(seed: u64) -> RiskInput {
    RiskInput {
        calibration: synthetic_scores(1000, 11),
        holdout: synthetic_scores(1000, 12),
        alpha: 0.1,
        seed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn budget_selections_form_a_chain() {
    let items: BTreeMap<String, f64> = [("a", 4.0), ("b", 1.0), ("c", 2.5), ("d", 1.0), ("e", 6.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let s1 = BudgetMonotonicityContract::solve(&items, 2.0).unwrap();
    let s2 = BudgetMonotonicityContract::solve(&items, 5.0).unwrap();
    let s3 = BudgetMonotonicityContract::solve(&items, 20.0).unwrap();
    assert!(s1.is_subset(&s2) && s2.is_subset(&s3));
    assert_eq!(s1, set(&["b", "d"]));

    let cert = BudgetMonotonicityContract::verify_monotonicity(&items, &[2.0, 5.0, 20.0]).unwrap();
    assert!(cert.pass);
}

#[test]
fn readding_items_leaves_state_unchanged() {
    let items = [json!({"q": 1}), json!({"q": 2}), json!({"q": 3})];
    let mut store = DedupStore::new();
    for item in &items {
        assert!(store.add(item).unwrap());
    }
    let hash = store.state_hash();
    for _ in 0..4 {
        for item in &items {
            assert!(!store.add(item).unwrap());
        }
    }
    assert_eq!(store.state_hash(), hash);
    assert_eq!(store.duplicate_count(), 12);

    let mut shuffled = DedupStore::new();
    for item in [&items[2], &items[0], &items[1]] {
        shuffled.add(item).unwrap();
    }
    assert_eq!(shuffled.state_hash(), hash);
}

#[test]
fn ordering_breaks_ties_lexicographically() {
    let input = OrderingInput {
        items: vec![
            json!({"score": 10, "id": "b"}),
            json!({"score": 10, "id": "a"}),
            json!({"score": 5, "id": "c"}),
        ],
        key_field: "score".into(),
        tie_break_field: Some("id".into()),
    };
    let sorted = TotalOrderingContract::sort(&input).unwrap();
    let ids: Vec<&str> = sorted.iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["c", "a", "b"]);

    let pairs = vec![(10, "b"), (10, "a"), (5, "c")];
    let sorted = stable_sort_by(&pairs, |p| p.0, |p| p.1);
    assert_eq!(sorted, vec![(5, "c"), (10, "a"), (10, "b")]);
}

#[test]
fn any_single_mutation_changes_the_merkle_root() {
    let trail: Vec<Value> = (0..7).map(|i| json!({"event": i})).collect();
    let root = MerkleTree::build(&trail).unwrap().root();
    assert!(verify_trace(&trail, &root).unwrap());
    for i in 0..trail.len() {
        let mut tampered = trail.clone();
        tampered[i] = json!({"event": i, "tampered": true});
        assert!(!verify_trace(&tampered, &root).unwrap(), "mutation at {} undetected", i);
    }
    let tree = MerkleTree::build(&trail).unwrap();
    for i in 0..trail.len() {
        assert!(tree.proof(i).unwrap().verify(&root));
    }
}

#[tokio::test]
async fn pool_output_identical_for_one_and_four_workers() {
    let job = job_fn(|input: u64, _ctx| {
        Ok::<_, TaskError>(input.wrapping_mul(2_654_435_761) % 1_000_003)
    });
    let inputs: Vec<u64> = (0..64).collect();
    let cert = ConcurrencyDeterminismContract::new(4)
        .verify_determinism(job, inputs)
        .await
        .unwrap();
    assert!(cert.pass);
    assert_eq!(cert.fields["sequential_hash"], cert.fields["parallel_hash"]);
}

#[test]
fn risk_certificate_is_reproducible_and_covers() {
    let rcc = RiskCertificateContract::default();
    let a = rcc.verify_risk(&risk_input(42)).unwrap();
    let b = rcc.verify_risk(&risk_input(42)).unwrap();
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());

    let report = rcc.compute(&risk_input(42)).unwrap();
    assert!(report.coverage >= report.target - report.epsilon);
    assert!(report.pass);
}

#[test]
fn snapshot_refuses_incomplete_maps() {
    let empty = SnapshotContract::verify_snapshot(&BTreeMap::new()).unwrap_err();
    assert_eq!(empty.clause, RefusalClause::Snapshot);

    let partial = BTreeMap::from([("standards_hash".to_string(), "x".to_string())]);
    let err = SnapshotContract::verify_snapshot(&partial).unwrap_err();
    assert!(err.message.contains("corpus_hash"));
    assert!(err.message.contains("index_hash"));

    let full = BTreeMap::from([
        ("standards_hash".to_string(), "s".to_string()),
        ("corpus_hash".to_string(), "c".to_string()),
        ("index_hash".to_string(), "i".to_string()),
    ]);
    let (_, d1) = SnapshotContract::verify_snapshot(&full).unwrap();
    let (_, d2) = SnapshotContract::verify_snapshot(&full).unwrap();
    assert_eq!(d1, d2);
}

#[tokio::test]
async fn snapshot_contract_surfaces_refusal_as_error() {
    let err = SnapshotContract.verify(&BTreeMap::new()).await.unwrap_err();
    assert!(err.is_refusal());
}

#[test]
fn compliance_label_never_drops_on_superset() {
    let rules = ComplianceRules::new(["budget", "baseline", "targets"], ["budget"]);
    let e = set(&["budget"]);
    let e_prime = set(&["budget", "baseline", "targets"]);
    assert_eq!(MonotoneComplianceContract::evaluate(&e, &rules), Label::Partial);
    assert_eq!(MonotoneComplianceContract::evaluate(&e_prime, &rules), Label::Sat);
    assert!(MonotoneComplianceContract::verify_monotonicity(&e, &e_prime, &rules)
        .unwrap()
        .pass);

    let err = MonotoneComplianceContract::verify_monotonicity(&e_prime, &e, &rules).unwrap_err();
    assert!(matches!(err, ContractError::NotSubset { .. }));
}

#[test]
fn fallback_is_identical_and_undeclared_errors_propagate() {
    #[derive(Debug, PartialEq)]
    enum Failure {
        Expected,
        Unexpected,
    }
    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }
    let fallback = json!({"score": 0});
    let declared = |e: &Failure| *e == Failure::Expected;

    let a = execute_with_fallback(|| Err(Failure::Expected), &fallback, declared).unwrap();
    let b = execute_with_fallback(|| Err(Failure::Expected), &fallback, declared).unwrap();
    assert!(a.degraded && b.degraded);
    assert_eq!(a.value, b.value);

    let err = execute_with_fallback(|| Err::<Value, _>(Failure::Unexpected), &fallback, declared)
        .err()
        .unwrap();
    assert_eq!(err, Failure::Unexpected);
}

#[tokio::test]
async fn written_certificates_are_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let rcc = RiskCertificateContract::default();

    for dir in [first.path(), second.path()] {
        rcc.verify(&risk_input(42)).await.unwrap().write_to(dir).unwrap();
    }
    let name = ContractKind::Risk.certificate_filename();
    assert_eq!(name, "rcc_certificate.json");
    let a = std::fs::read(first.path().join(&name)).unwrap();
    let b = std::fs::read(second.path().join(&name)).unwrap();
    assert_eq!(a, b);

    let restored = ContractCertificate::read_from(&first.path().join(&name)).unwrap();
    assert!(restored.verify_integrity());
    assert_eq!(restored.contract, ContractKind::Risk);
}
