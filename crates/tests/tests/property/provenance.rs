//! Property tests: the evidence registry stays an acyclic, replayable DAG
//! whose state digest depends only on what was recorded.

use audita_evidence::{EvidenceRegistry, RegistryError};
use audita_types::{ContentHash, Evidence};
use proptest::prelude::*;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn evidence(tag: u32) -> Evidence {
    Evidence::simple(json!({ "tag": tag }), 1.0).unwrap()
}

/// Parent index for each node after the first, always pointing backwards.
fn arb_parents() -> impl Strategy<Value = Vec<prop::sample::Index>> {
    prop::collection::vec(any::<prop::sample::Index>(), 0..24)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Any backward-linked graph records cleanly and every node replays.
    #[test]
    fn backward_links_always_replay(parents in arb_parents()) {
        let registry = EvidenceRegistry::new();
        let root = registry.record(evidence(0), "root", &[]).unwrap();
        let mut hashes: Vec<ContentHash> = vec![root.output_hash];
        for (i, parent) in parents.iter().enumerate() {
            let input = hashes[parent.index(hashes.len())];
            let node = registry
                .record(evidence(i as u32 + 1), "derive", &[input])
                .unwrap();
            hashes.push(node.output_hash);
        }
        prop_assert_eq!(registry.len().unwrap(), hashes.len());
        for node in registry.nodes().unwrap() {
            prop_assert!(registry.verify_replay(&node));
        }
        let last = *hashes.last().unwrap();
        if last != root.output_hash {
            prop_assert!(registry.ancestors(&last).unwrap().contains(&root.output_hash));
        }
    }

    /// Recording the same roots in any order gives the same state digest,
    /// and re-recording only bumps the duplicate counter.
    #[test]
    fn state_digest_ignores_recording_order(
        tags in prop::collection::btree_set(any::<u32>(), 1..16),
    ) {
        let tags: Vec<u32> = tags.into_iter().collect();
        let forward = EvidenceRegistry::new();
        let backward = EvidenceRegistry::new();
        for t in &tags {
            forward.record(evidence(*t), "root", &[]).unwrap();
        }
        for t in tags.iter().rev() {
            backward.record(evidence(*t), "root", &[]).unwrap();
        }
        prop_assert_eq!(forward.state_digest().unwrap(), backward.state_digest().unwrap());

        let before = forward.state_digest().unwrap();
        for t in &tags {
            forward.record(evidence(*t), "root", &[]).unwrap();
        }
        prop_assert_eq!(forward.state_digest().unwrap(), before);
        prop_assert_eq!(forward.duplicate_count() as usize, tags.len());
    }

    /// Evidence can never list itself as an input.
    #[test]
    fn self_reference_is_rejected(tag in any::<u32>()) {
        let registry = EvidenceRegistry::new();
        let e = evidence(tag);
        let id = e.id;
        let err = registry.record(e, "loop", &[id]).unwrap_err();
        prop_assert!(matches!(err, RegistryError::Cycle(_)));
        prop_assert!(registry.is_empty().unwrap());
    }

    /// Unknown inputs are refused rather than dangling.
    #[test]
    fn unknown_inputs_are_rejected(tag in any::<u32>(), other in any::<u32>()) {
        prop_assume!(tag != other);
        let registry = EvidenceRegistry::new();
        let missing = evidence(other).id;
        let err = registry.record(evidence(tag), "orphan", &[missing]).unwrap_err();
        prop_assert!(matches!(err, RegistryError::UnknownInput(h) if h == missing));
    }
}
