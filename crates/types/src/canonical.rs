//! Canonical JSON: sorted object keys, compact separators.
//!
//! Every content hash in the workspace is computed over this form, so two
//! values that differ only in map construction order hash identically.

use crate::hash::ContentHash;
use serde::Serialize;
use serde_json::{Map, Value};

/// Errors raised while canonicalizing a value.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("value is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Recursively rebuild a JSON value with object keys in sorted order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Canonical JSON value of any serializable type.
pub fn canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, CanonicalError> {
    Ok(canonicalize(serde_json::to_value(value)?))
}

/// Canonical compact JSON bytes.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    Ok(serde_json::to_vec(&canonical_value(value)?)?)
}

/// Canonical compact JSON string.
pub fn canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(serde_json::to_string(&canonical_value(value)?)?)
}

/// BLAKE3 over the canonical JSON form.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, CanonicalError> {
    Ok(ContentHash::hash(&canonical_bytes(value)?))
}

/// Pretty, key-sorted JSON. Used for certificate files that must be
/// byte-reproducible.
pub fn canonical_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(serde_json::to_string_pretty(&canonical_value(value)?)?)
}
