//! Property tests: results and digests never depend on scheduling or
//! construction order.

use audita_orchestrator::SeedRegistry;
use audita_pool::{job_fn, tasks_from_inputs, PoolConfig, TaskError, WorkerPool};
use audita_types::{content_hash, ExecutionStatus};
use proptest::prelude::*;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_entries() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..16)
        .prop_map(|m| m.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Results come back at their submission index for any worker count.
    #[test]
    fn pool_results_are_index_stable(
        inputs in prop::collection::vec(any::<u32>(), 0..40),
        workers in 1usize..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let job = job_fn(|x: u32, _ctx| Ok::<_, TaskError>(u64::from(x) * 3));
            WorkerPool::new(PoolConfig::sequential().with_workers(workers))
                .run(tasks_from_inputs(job, inputs.clone()))
                .await
        });
        prop_assert_eq!(results.len(), inputs.len());
        for (i, (result, input)) in results.iter().zip(&inputs).enumerate() {
            prop_assert_eq!(result.index, i);
            prop_assert_eq!(result.status, ExecutionStatus::Success);
            prop_assert_eq!(result.output, Some(u64::from(*input) * 3));
        }
    }

    /// Map insertion order never changes the canonical hash.
    #[test]
    fn canonical_hash_ignores_insertion_order(entries in arb_entries()) {
        let forward: HashMap<String, i64> = entries.iter().cloned().collect();
        let backward: HashMap<String, i64> = entries.iter().rev().cloned().collect();
        prop_assert_eq!(content_hash(&forward).unwrap(), content_hash(&backward).unwrap());
    }

    /// Seeds are a pure function of (policy unit, correlation, component).
    #[test]
    fn seeds_are_pure(
        unit in "[A-Z]{2}-[0-9]{3}",
        corr in "[a-z0-9]{1,12}",
        component in "[a-z.:0-9]{1,20}",
    ) {
        let registry = SeedRegistry::new(unit.clone(), corr.clone());
        let seed = registry.seed_for(&component);
        prop_assert_eq!(seed, SeedRegistry::derive(&unit, &corr, &component));
        prop_assert_eq!(registry.seed_for(&component), seed);
        prop_assert_eq!(registry.audit_log().len(), 1);
    }
}
