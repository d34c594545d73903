use crate::error::StoreError;
use audita_types::{ContentHash, Evidence};
use std::collections::HashMap;
use std::sync::RwLock;

/// Content-addressed evidence storage.
///
/// Stores are append-only: an entry is never replaced once written.
pub trait EvidenceStore: Send + Sync {
    /// Insert unless an entry with the same id exists. Returns `true` when
    /// the evidence was newly stored.
    fn put_if_absent(&self, evidence: Evidence) -> Result<bool, StoreError>;
    fn get(&self, hash: &ContentHash) -> Result<Option<Evidence>, StoreError>;
    fn contains(&self, hash: &ContentHash) -> Result<bool, StoreError>;
    /// All stored ids, sorted.
    fn hashes(&self) -> Result<Vec<ContentHash>, StoreError>;
    fn len(&self) -> Result<usize, StoreError>;
}

/// In-memory store for runs and tests.
#[derive(Default)]
pub struct InMemoryEvidenceStore {
    values: RwLock<HashMap<ContentHash, Evidence>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn put_if_absent(&self, evidence: Evidence) -> Result<bool, StoreError> {
        let mut values = self.values.write().map_err(poisoned)?;
        if values.contains_key(&evidence.id) {
            return Ok(false);
        }
        values.insert(evidence.id, evidence);
        Ok(true)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Evidence>, StoreError> {
        let values = self.values.read().map_err(poisoned)?;
        Ok(values.get(hash).cloned())
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        let values = self.values.read().map_err(poisoned)?;
        Ok(values.contains_key(hash))
    }

    fn hashes(&self) -> Result<Vec<ContentHash>, StoreError> {
        let values = self.values.read().map_err(poisoned)?;
        let mut hashes: Vec<ContentHash> = values.keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let values = self.values.read().map_err(poisoned)?;
        Ok(values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_is_write_once() {
        let store = InMemoryEvidenceStore::new();
        let e = Evidence::simple(json!({"a": 1}), 0.5).unwrap();
        assert!(store.put_if_absent(e.clone()).unwrap());
        assert!(!store.put_if_absent(e.clone()).unwrap());
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&e.id).unwrap(), Some(e));
    }

    #[test]
    fn hashes_sorted() {
        let store = InMemoryEvidenceStore::new();
        for i in 0..5 {
            store
                .put_if_absent(Evidence::simple(json!(i), 1.0).unwrap())
                .unwrap();
        }
        let hashes = store.hashes().unwrap();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }
}
