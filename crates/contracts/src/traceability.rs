//! Traceability: a Merkle tree over an ordered event trail.
//!
//! Leaves and interior nodes are hashed under distinct domain tags. An odd
//! node at the end of a level is carried up unchanged rather than paired with
//! itself.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{canonical_bytes, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LEAF_TAG: &[u8] = b"audita.merkle.leaf";
const NODE_TAG: &[u8] = b"audita.merkle.node";
const EMPTY_TAG: &[u8] = b"audita.merkle.empty";

fn leaf_hash(bytes: &[u8]) -> ContentHash {
    ContentHash::hash_parts([LEAF_TAG, bytes])
}

fn node_hash(left: &ContentHash, right: &ContentHash) -> ContentHash {
    ContentHash::hash_parts([NODE_TAG, &left.as_bytes()[..], &right.as_bytes()[..]])
}

/// Which side a proof sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub index: usize,
    pub leaf: ContentHash,
    pub siblings: Vec<(Side, ContentHash)>,
}

impl MerkleProof {
    /// Root implied by this proof for the given leaf hash.
    pub fn root_for(&self, leaf: ContentHash) -> ContentHash {
        self.siblings.iter().fold(leaf, |acc, (side, sibling)| match side {
            Side::Left => node_hash(sibling, &acc),
            Side::Right => node_hash(&acc, sibling),
        })
    }

    pub fn verify(&self, root: &ContentHash) -> bool {
        self.root_for(self.leaf) == *root
    }
}

#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves; the last level holds the root.
    levels: Vec<Vec<ContentHash>>,
}

impl MerkleTree {
    /// Build over a trail of serializable events (canonical JSON per leaf).
    pub fn build<T: Serialize>(trail: &[T]) -> Result<Self, ContractError> {
        let leaves = trail
            .iter()
            .map(|event| -> Result<_, ContractError> { Ok(leaf_hash(&canonical_bytes(event)?)) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_leaves(leaves))
    }

    pub fn from_leaves(leaves: Vec<ContentHash>) -> Self {
        let mut levels = vec![leaves];
        while levels.last().map_or(0, Vec::len) > 1 {
            let current = &levels[levels.len() - 1];
            let next: Vec<ContentHash> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => node_hash(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> ContentHash {
        match self.levels.last().and_then(|level| level.first()) {
            Some(root) => *root,
            None => ContentHash::hash_parts([EMPTY_TAG]),
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels.first()?.get(index)?;
        let mut siblings = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = position ^ 1;
            if let Some(hash) = level.get(sibling) {
                let side = if sibling < position {
                    Side::Left
                } else {
                    Side::Right
                };
                siblings.push((side, *hash));
            }
            position /= 2;
        }
        Some(MerkleProof {
            index,
            leaf,
            siblings,
        })
    }
}

/// Recompute the root of `trail` and compare with `root`.
pub fn verify_trace<T: Serialize>(trail: &[T], root: &ContentHash) -> Result<bool, ContractError> {
    Ok(MerkleTree::build(trail)?.root() == *root)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceInput {
    pub trail: Vec<Value>,
    /// Previously published root to check against.
    #[serde(default)]
    pub expected_root: Option<ContentHash>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TraceabilityContract;

impl TraceabilityContract {
    /// Build the tree, verify every inclusion proof, and check that mutating
    /// any single event would change the root.
    pub fn verify_traceability(input: &TraceInput) -> Result<ContractCertificate, ContractError> {
        let digest = inputs_digest(input)?;
        let tree = MerkleTree::build(&input.trail)?;
        let root = tree.root();

        let mut proofs_ok = 0usize;
        let mut mutation_sensitive = true;
        for (i, event) in input.trail.iter().enumerate() {
            let Some(proof) = tree.proof(i) else {
                continue;
            };
            if proof.verify(&root) {
                proofs_ok += 1;
            }
            let mutated = serde_json::json!({ "mutated": event });
            let mutated_leaf = leaf_hash(&canonical_bytes(&mutated)?);
            if proof.root_for(mutated_leaf) == root {
                mutation_sensitive = false;
            }
        }

        let mut builder = CertificateBuilder::new(ContractKind::Traceability, digest)
            .check(proofs_ok == tree.leaf_count(), "inclusion_proofs", || {
                format!("{} of {} proofs verified", proofs_ok, tree.leaf_count())
            })
            .check(mutation_sensitive, "mutation_sensitive", || {
                "a single-event mutation left the root unchanged".into()
            });
        if let Some(expected) = &input.expected_root {
            builder = builder.check(*expected == root, "root_match", || {
                format!("computed root {} differs from expected {}", root, expected)
            });
        }
        Ok(builder
            .field("merkle_root", &root)
            .field("leaf_count", &tree.leaf_count())
            .field("proof_count", &proofs_ok)
            .seal())
    }
}

#[async_trait]
impl Contract for TraceabilityContract {
    type Input = TraceInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Traceability
    }

    async fn verify(&self, input: &TraceInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_traceability(input)
    }
}
