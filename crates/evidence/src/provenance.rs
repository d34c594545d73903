use crate::error::CycleError;
use audita_types::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// One evidence-producing step: `inputs --method--> output`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub method_id: String,
    pub input_hashes: Vec<ContentHash>,
    pub output_hash: ContentHash,
    /// `H(method_id, input_hashes, output_hash)`. Excludes `recorded_at`.
    pub derivation_hash: ContentHash,
    pub recorded_at: DateTime<Utc>,
}

impl ProvenanceNode {
    pub fn new(
        method_id: impl Into<String>,
        input_hashes: Vec<ContentHash>,
        output_hash: ContentHash,
    ) -> Self {
        let method_id = method_id.into();
        let derivation_hash = Self::compute_derivation(&method_id, &input_hashes, &output_hash);
        Self {
            method_id,
            input_hashes,
            output_hash,
            derivation_hash,
            recorded_at: Utc::now(),
        }
    }

    pub fn compute_derivation(
        method_id: &str,
        input_hashes: &[ContentHash],
        output_hash: &ContentHash,
    ) -> ContentHash {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(input_hashes.len() + 3);
        parts.push(method_id.as_bytes().to_vec());
        parts.push((input_hashes.len() as u64).to_le_bytes().to_vec());
        parts.extend(input_hashes.iter().map(|h| h.as_bytes().to_vec()));
        parts.push(output_hash.as_bytes().to_vec());
        ContentHash::hash_parts(parts)
    }

    /// Whether the stored derivation hash matches the recorded fields.
    pub fn verify_derivation(&self) -> bool {
        Self::compute_derivation(&self.method_id, &self.input_hashes, &self.output_hash)
            == self.derivation_hash
    }
}

/// Acyclic graph of provenance nodes keyed by output hash.
///
/// Edges run from each input hash to the output hash. Inputs without a node of
/// their own are roots.
#[derive(Clone, Debug, Default)]
pub struct ProvenanceDag {
    nodes: HashMap<ContentHash, ProvenanceNode>,
    children: HashMap<ContentHash, BTreeSet<ContentHash>>,
}

impl ProvenanceDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns `Ok(false)` when a node for the same output
    /// already exists (the graph is unchanged).
    pub fn insert(&mut self, node: ProvenanceNode) -> Result<bool, CycleError> {
        let output = node.output_hash;
        if self.nodes.contains_key(&output) {
            return Ok(false);
        }
        for input in &node.input_hashes {
            if *input == output {
                return Err(CycleError {
                    output,
                    path: vec![output, output],
                });
            }
            if let Some(mut path) = self.path(&output, input) {
                path.push(output);
                return Err(CycleError { output, path });
            }
        }
        for input in &node.input_hashes {
            self.children.entry(*input).or_default().insert(output);
        }
        self.nodes.insert(output, node);
        Ok(true)
    }

    pub fn node(&self, hash: &ContentHash) -> Option<&ProvenanceNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, hash: &ContentHash) -> Vec<ContentHash> {
        self.children
            .get(hash)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All transitive inputs of `hash`, sorted.
    pub fn ancestors(&self, hash: &ContentHash) -> BTreeSet<ContentHash> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ContentHash> = VecDeque::new();
        if let Some(node) = self.nodes.get(hash) {
            queue.extend(node.input_hashes.iter().copied());
        }
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.input_hashes.iter().copied());
            }
        }
        seen
    }

    /// All transitive outputs derived from `hash`, sorted.
    pub fn descendants(&self, hash: &ContentHash) -> BTreeSet<ContentHash> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ContentHash> = self.children(hash).into();
        while let Some(current) = queue.pop_front() {
            if seen.insert(current) {
                queue.extend(self.children(&current));
            }
        }
        seen
    }

    /// Node outputs in dependency order; ties resolved by hash.
    pub fn topological_order(&self) -> Vec<ContentHash> {
        let mut pending: HashMap<ContentHash, usize> = self
            .nodes
            .iter()
            .map(|(hash, node)| {
                let internal = node
                    .input_hashes
                    .iter()
                    .filter(|i| self.nodes.contains_key(i))
                    .count();
                (*hash, internal)
            })
            .collect();
        let mut ready: BTreeSet<ContentHash> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(h, _)| *h)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for child in self.children(&next) {
                if let Some(count) = pending.get_mut(&child) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
        order
    }

    /// Depth-first search along child edges from `from` to `to`.
    fn path(&self, from: &ContentHash, to: &ContentHash) -> Option<Vec<ContentHash>> {
        let mut stack = vec![(*from, vec![*from])];
        let mut seen = BTreeSet::new();
        while let Some((current, path)) = stack.pop() {
            if current == *to {
                return Some(path);
            }
            if !seen.insert(current) {
                continue;
            }
            for child in self.children(&current) {
                let mut next = path.clone();
                next.push(child);
                stack.push((child, next));
            }
        }
        None
    }
}
