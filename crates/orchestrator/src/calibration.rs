//! Calibration parameters, injected explicitly into each method invocation.

use audita_types::{content_hash, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_BUNDLE_VERSION: &str = "default";

/// Parameters one method runs with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterBundle {
    pub method_id: String,
    pub version: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl ParameterBundle {
    pub fn new(method_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            method_id: method_id.into(),
            version: version.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(Value::as_f64)
    }

    pub fn digest(&self) -> ContentHash {
        content_hash(self).expect("serializable")
    }
}

/// Method id to parameter bundle. Methods without an entry get an empty
/// default bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRegistry {
    bundles: BTreeMap<String, ParameterBundle>,
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bundle: ParameterBundle) -> Option<ParameterBundle> {
        self.bundles.insert(bundle.method_id.clone(), bundle)
    }

    pub fn with_bundle(mut self, bundle: ParameterBundle) -> Self {
        self.insert(bundle);
        self
    }

    pub fn get(&self, method_id: &str) -> Option<&ParameterBundle> {
        self.bundles.get(method_id)
    }

    pub fn resolve(&self, method_id: &str) -> ParameterBundle {
        self.bundles
            .get(method_id)
            .cloned()
            .unwrap_or_else(|| ParameterBundle::new(method_id, DEFAULT_BUNDLE_VERSION))
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Digest over every registered bundle.
    pub fn digest(&self) -> ContentHash {
        content_hash(&self.bundles).expect("serializable")
    }
}
