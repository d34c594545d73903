use crate::error::{RegistryError, StoreError};
use crate::provenance::{ProvenanceDag, ProvenanceNode};
use crate::store::{EvidenceStore, InMemoryEvidenceStore};
use audita_types::{ContentHash, Evidence};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only evidence registry with provenance tracking.
///
/// Values live in an [`EvidenceStore`] (read/write locked per hash); the
/// provenance graph sits behind its own mutex, which also serializes
/// `record` calls so that the check-then-insert sequence is atomic.
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct EvidenceRegistry {
    store: Arc<dyn EvidenceStore>,
    dag: Arc<Mutex<ProvenanceDag>>,
    duplicates: Arc<AtomicU64>,
}

impl Default for EvidenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceRegistry {
    /// Registry over an in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryEvidenceStore::new()))
    }

    pub fn with_store(store: Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            dag: Arc::new(Mutex::new(ProvenanceDag::new())),
            duplicates: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record `evidence` as the output of `method_id` applied to `input_hashes`.
    ///
    /// Recording evidence whose id is already present is a no-op that returns
    /// the original node and bumps the duplicate counter.
    pub fn record(
        &self,
        evidence: Evidence,
        method_id: &str,
        input_hashes: &[ContentHash],
    ) -> Result<ProvenanceNode, RegistryError> {
        evidence.verify_content_hash()?;
        let output = evidence.id;

        let mut dag = self.lock_dag()?;
        if let Some(existing) = dag.node(&output) {
            let count = self.duplicates.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                evidence = %output,
                method_id,
                duplicates = count,
                "Duplicate evidence ignored"
            );
            return Ok(existing.clone());
        }

        let node = ProvenanceNode::new(method_id, input_hashes.to_vec(), output);
        // Self-references are cycles even though the output is not stored yet.
        if !input_hashes.contains(&output) {
            for input in input_hashes {
                if !self.store.contains(input)? {
                    return Err(RegistryError::UnknownInput(*input));
                }
            }
        }
        dag.insert(node.clone())?;
        self.store.put_if_absent(evidence)?;

        tracing::debug!(
            evidence = %output,
            method_id,
            inputs = input_hashes.len(),
            "Evidence recorded"
        );
        Ok(node)
    }

    pub fn get(&self, hash: &ContentHash) -> Result<Option<Evidence>, RegistryError> {
        Ok(self.store.get(hash)?)
    }

    /// Like [`get`](Self::get) but missing evidence is an error.
    pub fn require(&self, hash: &ContentHash) -> Result<Evidence, RegistryError> {
        self.get(hash)?.ok_or(RegistryError::NotFound(*hash))
    }

    pub fn contains(&self, hash: &ContentHash) -> Result<bool, RegistryError> {
        Ok(self.store.contains(hash)?)
    }

    pub fn node(&self, hash: &ContentHash) -> Result<Option<ProvenanceNode>, RegistryError> {
        Ok(self.lock_dag()?.node(hash).cloned())
    }

    /// Check a node against the recorded state: the derivation hash must
    /// recompute, the node must match the recorded one, every input must be
    /// present, and the stored output must still hash to `output_hash`.
    pub fn verify_replay(&self, node: &ProvenanceNode) -> bool {
        match self.check_replay(node) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(evidence = %node.output_hash, error = %e, "Replay check failed");
                false
            }
        }
    }

    fn check_replay(&self, node: &ProvenanceNode) -> Result<bool, RegistryError> {
        if !node.verify_derivation() {
            return Ok(false);
        }
        match self.node(&node.output_hash)? {
            Some(recorded) if recorded.derivation_hash == node.derivation_hash => {}
            _ => return Ok(false),
        }
        for input in &node.input_hashes {
            if !self.contains(input)? {
                return Ok(false);
            }
        }
        let Some(output) = self.get(&node.output_hash)? else {
            return Ok(false);
        };
        Ok(output.id == node.output_hash && output.verify_content_hash().is_ok())
    }

    /// Re-execute the producing method over the recorded inputs and compare
    /// the fresh output's content hash with the recorded one.
    pub fn verify_replay_with<F, E>(
        &self,
        node: &ProvenanceNode,
        replayer: F,
    ) -> Result<bool, RegistryError>
    where
        F: FnOnce(&str, &[Evidence]) -> Result<Evidence, E>,
        E: std::fmt::Display,
    {
        if !self.verify_replay(node) {
            return Ok(false);
        }
        let inputs = node
            .input_hashes
            .iter()
            .map(|h| self.require(h))
            .collect::<Result<Vec<_>, _>>()?;
        let fresh = replayer(&node.method_id, &inputs).map_err(|e| RegistryError::Replay {
            method_id: node.method_id.clone(),
            detail: e.to_string(),
        })?;
        Ok(fresh.id == node.output_hash)
    }

    /// Order-insensitive digest over every stored id.
    pub fn state_digest(&self) -> Result<ContentHash, RegistryError> {
        let hashes = self.store.hashes()?;
        Ok(ContentHash::hash_parts(hashes.iter().map(|h| h.as_bytes())))
    }

    /// Transitive inputs of `hash`, sorted.
    pub fn ancestors(&self, hash: &ContentHash) -> Result<Vec<ContentHash>, RegistryError> {
        Ok(self.lock_dag()?.ancestors(hash).into_iter().collect())
    }

    /// Recorded nodes in dependency order.
    pub fn nodes(&self) -> Result<Vec<ProvenanceNode>, RegistryError> {
        let dag = self.lock_dag()?;
        Ok(dag
            .topological_order()
            .iter()
            .filter_map(|h| dag.node(h).cloned())
            .collect())
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::SeqCst)
    }

    fn lock_dag(&self) -> Result<MutexGuard<'_, ProvenanceDag>, RegistryError> {
        self.dag
            .lock()
            .map_err(|e| RegistryError::Store(StoreError::LockPoisoned(e.to_string())))
    }
}
