use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three keys of an environment snapshot, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaKey {
    StandardsHash,
    CorpusHash,
    IndexHash,
}

impl SigmaKey {
    pub const ALL: [SigmaKey; 3] = [
        SigmaKey::StandardsHash,
        SigmaKey::CorpusHash,
        SigmaKey::IndexHash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardsHash => "standards_hash",
            Self::CorpusHash => "corpus_hash",
            Self::IndexHash => "index_hash",
        }
    }
}

impl fmt::Display for SigmaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment snapshot: the exact standards, corpus and index a run used.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sigma {
    pub standards_hash: String,
    pub corpus_hash: String,
    pub index_hash: String,
}

impl Sigma {
    pub fn new(
        standards_hash: impl Into<String>,
        corpus_hash: impl Into<String>,
        index_hash: impl Into<String>,
    ) -> Self {
        Self {
            standards_hash: standards_hash.into(),
            corpus_hash: corpus_hash.into(),
            index_hash: index_hash.into(),
        }
    }

    pub fn get(&self, key: SigmaKey) -> &str {
        match key {
            SigmaKey::StandardsHash => &self.standards_hash,
            SigmaKey::CorpusHash => &self.corpus_hash,
            SigmaKey::IndexHash => &self.index_hash,
        }
    }

    /// Keys that are empty or whitespace-only.
    pub fn missing_keys(&self) -> Vec<SigmaKey> {
        SigmaKey::ALL
            .into_iter()
            .filter(|k| self.get(*k).trim().is_empty())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }

    /// Build from a loose key/value map. Returns the missing keys when any of
    /// the three is absent or empty, in canonical key order.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, Vec<SigmaKey>> {
        let missing: Vec<SigmaKey> = SigmaKey::ALL
            .into_iter()
            .filter(|k| map.get(k.as_str()).map_or(true, |v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        let value = |k: SigmaKey| map.get(k.as_str()).cloned().unwrap_or_default();
        Ok(Self {
            standards_hash: value(SigmaKey::StandardsHash),
            corpus_hash: value(SigmaKey::CorpusHash),
            index_hash: value(SigmaKey::IndexHash),
        })
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        SigmaKey::ALL
            .into_iter()
            .map(|k| (k.as_str().to_string(), self.get(k).to_string()))
            .collect()
    }

    /// Deterministic digest over the ordered triple.
    pub fn digest(&self) -> ContentHash {
        ContentHash::hash_parts(SigmaKey::ALL.into_iter().flat_map(|k| {
            [k.as_str().as_bytes().to_vec(), self.get(k).as_bytes().to_vec()]
        }))
    }
}
