//! Property tests: the algebraic laws each contract certifies hold for
//! arbitrary inputs, not only the canned probes.

use audita_contracts::{
    stable_sort, BudgetMonotonicityContract, ComplianceRules, DedupStore, MerkleTree,
    MonotoneComplianceContract, RouteCandidate, RoutingContract, RoutingInputs,
};
use audita_types::Sigma;
use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_costs() -> impl Strategy<Value = BTreeMap<String, f64>> {
    prop::collection::btree_map("[a-h]{1,3}", 0.0f64..10.0, 0..12)
}

fn arb_requirements() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("r[0-9]", 0..5)
}

fn arb_candidates() -> impl Strategy<Value = Vec<RouteCandidate>> {
    prop::collection::vec(("m-[a-z]{1,4}", 0.0f64..1.0, 0.0f64..4.0), 0..10).prop_map(|v| {
        v.into_iter()
            .map(|(id, score, cost)| RouteCandidate { id, score, cost })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// S(B1) ⊆ S(B2) ⊆ S(B3) whenever B1 <= B2 <= B3.
    #[test]
    fn budget_selection_is_monotone(
        items in arb_costs(),
        mut budgets in prop::collection::vec(0.0f64..40.0, 3),
    ) {
        budgets.sort_by(f64::total_cmp);
        let sets: Vec<_> = budgets
            .iter()
            .map(|b| BudgetMonotonicityContract::solve(&items, *b).unwrap())
            .collect();
        prop_assert!(sets[0].is_subset(&sets[1]));
        prop_assert!(sets[1].is_subset(&sets[2]));
        let cert = BudgetMonotonicityContract::verify_monotonicity(&items, &budgets).unwrap();
        prop_assert!(cert.pass);
    }

    /// Dedup state depends only on the set of items.
    #[test]
    fn dedup_state_is_order_insensitive(
        items in prop::collection::vec(0u8..20, 1..20).prop_shuffle(),
        rounds in 1usize..4,
    ) {
        let mut sorted = items.clone();
        sorted.sort_unstable();
        let mut a = DedupStore::new();
        let mut b = DedupStore::new();
        for _ in 0..rounds {
            for i in &items {
                a.add(&json!({ "item": i })).unwrap();
            }
        }
        for i in &sorted {
            b.add(&json!({ "item": i })).unwrap();
        }
        prop_assert_eq!(a.state_hash(), b.state_hash());
        let unique: BTreeSet<_> = items.iter().collect();
        prop_assert_eq!(a.len(), unique.len());
        prop_assert_eq!(a.duplicate_count() as usize, rounds * items.len() - unique.len());
    }

    /// Sorting is a permutation, ascending in the key, and independent of
    /// input order.
    #[test]
    fn stable_sort_is_total(
        items in prop::collection::vec((0u8..5, "[a-z]{1,3}"), 0..20),
    ) {
        let forward = stable_sort(&items, |x| x.0).unwrap();
        let mut reversed_input = items.clone();
        reversed_input.reverse();
        let backward = stable_sort(&reversed_input, |x| x.0).unwrap();
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.len(), items.len());
        prop_assert!(forward.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    /// Changing any single event changes the Merkle root.
    #[test]
    fn merkle_root_detects_single_mutation(
        len in 1usize..24,
        index in any::<prop::sample::Index>(),
    ) {
        let trail: Vec<_> = (0..len).map(|i| json!({ "event": i })).collect();
        let root = MerkleTree::build(&trail).unwrap().root();
        let mut tampered = trail.clone();
        let i = index.index(len);
        tampered[i] = json!({ "event": i, "edited": true });
        prop_assert_ne!(MerkleTree::build(&tampered).unwrap().root(), root);
    }

    /// Adding evidence never lowers the compliance label.
    #[test]
    fn compliance_is_monotone(
        sat in arb_requirements(),
        evidence in arb_requirements(),
        extra in arb_requirements(),
    ) {
        let partial: BTreeSet<String> = sat.iter().take(1).cloned().collect();
        let rules = ComplianceRules { sat, partial };
        let extended: BTreeSet<String> = evidence.union(&extra).cloned().collect();
        let cert = MonotoneComplianceContract::verify_monotonicity(&evidence, &extended, &rules).unwrap();
        prop_assert!(cert.pass);
    }

    /// Routes are reproducible and never exceed the budget.
    #[test]
    fn routes_are_reproducible_and_affordable(
        candidates in arb_candidates(),
        theta in 0.0f64..1.0,
        budget in 0.0f64..10.0,
    ) {
        let inputs = RoutingInputs {
            context_hash: "ctx".into(),
            theta,
            sigma: Sigma::new("s", "c", "i"),
            budget,
            seed: 7,
            candidates,
        };
        let a = RoutingContract::compute_route(&inputs).unwrap();
        let b = RoutingContract::compute_route(&inputs).unwrap();
        prop_assert_eq!(&a.route_hash, &b.route_hash);
        prop_assert!(a.total_cost <= budget);
        prop_assert!(RoutingContract::verify_route(&inputs).unwrap().pass);
    }
}
