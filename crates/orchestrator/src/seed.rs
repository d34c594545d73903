use audita_types::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// One seed derivation, kept for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub component: String,
    pub seed: u32,
    pub derived_at: DateTime<Utc>,
}

/// Deterministic 32-bit seeds per run component.
///
/// `seed = prefix_u32(blake3("<policy_unit>:<correlation>:<component>"))`.
/// Seeds are cached; each component's first derivation is audit-logged.
#[derive(Debug)]
pub struct SeedRegistry {
    policy_unit_id: String,
    correlation_id: String,
    cache: RwLock<HashMap<String, u32>>,
    audit: Mutex<Vec<SeedRecord>>,
}

impl SeedRegistry {
    pub fn new(policy_unit_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            policy_unit_id: policy_unit_id.into(),
            correlation_id: correlation_id.into(),
            cache: RwLock::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
        }
    }

    pub fn derive(policy_unit_id: &str, correlation_id: &str, component: &str) -> u32 {
        let material = format!("{}:{}:{}", policy_unit_id, correlation_id, component);
        ContentHash::hash(material.as_bytes()).prefix_u32()
    }

    pub fn seed_for(&self, component: &str) -> u32 {
        {
            let cache = self.cache.read().unwrap_or_else(|p| p.into_inner());
            if let Some(seed) = cache.get(component) {
                return *seed;
            }
        }
        let mut cache = self.cache.write().unwrap_or_else(|p| p.into_inner());
        if let Some(seed) = cache.get(component) {
            return *seed;
        }
        let seed = Self::derive(&self.policy_unit_id, &self.correlation_id, component);
        cache.insert(component.to_string(), seed);
        drop(cache);

        tracing::debug!(component, seed, "Seed derived");
        self.audit
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(SeedRecord {
                component: component.to_string(),
                seed,
                derived_at: Utc::now(),
            });
        seed
    }

    pub fn audit_log(&self) -> Vec<SeedRecord> {
        self.audit.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
