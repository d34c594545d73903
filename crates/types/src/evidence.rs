use crate::canonical::canonical_bytes;
use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Errors from evidence construction.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("evidence hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },
}

/// An immutable record produced by a method execution.
///
/// Content-addressed: `id = blake3(canonical_json({content, confidence, metadata}))`.
/// Metadata is a sorted map and `content` is canonicalized before hashing, so
/// semantically equal records hash identically regardless of construction order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Content-addressed identifier.
    pub id: ContentHash,
    /// Produced payload.
    pub content: Value,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct HashedFields<'a> {
    content: &'a Value,
    confidence: f64,
    metadata: &'a BTreeMap<String, Value>,
}

impl Evidence {
    fn compute_id(content: &Value, confidence: f64, metadata: &BTreeMap<String, Value>) -> ContentHash {
        let fields = HashedFields {
            content,
            confidence,
            metadata,
        };
        let bytes = canonical_bytes(&fields).expect("evidence fields serializable");
        ContentHash::hash(&bytes)
    }

    /// Create evidence with a computed content hash.
    pub fn new(
        content: Value,
        confidence: f64,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Self, EvidenceError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EvidenceError::ConfidenceOutOfRange(confidence));
        }
        let id = Self::compute_id(&content, confidence, &metadata);
        Ok(Self {
            id,
            content,
            confidence,
            metadata,
        })
    }

    /// Evidence with empty metadata.
    pub fn simple(content: Value, confidence: f64) -> Result<Self, EvidenceError> {
        Self::new(content, confidence, BTreeMap::new())
    }

    /// Builder-style metadata addition. Recomputes the content hash.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self.id = Self::compute_id(&self.content, self.confidence, &self.metadata);
        self
    }

    /// Recompute the content hash from the stored fields.
    pub fn recompute_id(&self) -> ContentHash {
        Self::compute_id(&self.content, self.confidence, &self.metadata)
    }

    /// Verify that the stored ID matches the computed content hash.
    pub fn verify_content_hash(&self) -> Result<(), EvidenceError> {
        let computed = self.recompute_id();
        if computed != self.id {
            return Err(EvidenceError::HashMismatch {
                expected: self.id,
                computed,
            });
        }
        Ok(())
    }
}
