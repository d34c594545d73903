//! Idempotency & Dedup: a content-addressed set whose aggregate hash ignores
//! re-adds and insertion order.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{content_hash, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Deduplicating store keyed by content hash.
#[derive(Clone, Debug, Default)]
pub struct DedupStore {
    items: BTreeMap<ContentHash, Value>,
    duplicates: u64,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Returns `false` and bumps the duplicate counter when an
    /// item with the same content hash is already present.
    pub fn add<T: Serialize + ?Sized>(&mut self, item: &T) -> Result<bool, ContractError> {
        let value = audita_types::canonical_value(item)?;
        let hash = content_hash(&value)?;
        if self.items.contains_key(&hash) {
            self.duplicates += 1;
            return Ok(false);
        }
        self.items.insert(hash, value);
        Ok(true)
    }

    /// Aggregate hash over the sorted item hashes.
    pub fn state_hash(&self) -> ContentHash {
        ContentHash::hash_parts(self.items.keys().map(|h| h.as_bytes()))
    }

    pub fn duplicate_count(&self) -> u64 {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Items to add, and how many extra times each is re-added.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdempotencyInput {
    pub items: Vec<Value>,
    pub readds: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IdempotencyContract;

impl IdempotencyContract {
    pub fn verify_idempotency(input: &IdempotencyInput) -> Result<ContractCertificate, ContractError> {
        let digest = inputs_digest(input)?;

        let mut baseline = DedupStore::new();
        for item in &input.items {
            baseline.add(item)?;
        }
        let base_hash = baseline.state_hash();
        let base_dups = baseline.duplicate_count();

        let mut readded = baseline.clone();
        for _ in 0..input.readds {
            for item in &input.items {
                readded.add(item)?;
            }
        }
        let expected_dups = base_dups + (input.readds * input.items.len()) as u64;

        let mut reversed = DedupStore::new();
        for item in input.items.iter().rev() {
            reversed.add(item)?;
        }

        Ok(CertificateBuilder::new(ContractKind::Idempotency, digest)
            .check(readded.state_hash() == base_hash, "readd_invariance", || {
                format!("state hash changed after {} re-add round(s)", input.readds)
            })
            .check(readded.duplicate_count() == expected_dups, "duplicate_counter", || {
                format!(
                    "duplicate counter is {}, expected {}",
                    readded.duplicate_count(),
                    expected_dups
                )
            })
            .check(reversed.state_hash() == base_hash, "order_insensitive", || {
                "reversed insertion order produced a different state hash".into()
            })
            .field("state_hash", &base_hash)
            .field("unique_items", &baseline.len())
            .field("duplicates", &readded.duplicate_count())
            .seal())
    }
}

#[async_trait]
impl Contract for IdempotencyContract {
    type Input = IdempotencyInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Idempotency
    }

    async fn verify(&self, input: &IdempotencyInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_idempotency(input)
    }
}
