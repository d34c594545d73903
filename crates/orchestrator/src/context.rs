use crate::calibration::CalibrationRegistry;
use crate::seed::SeedRegistry;
use audita_contracts::RefusalContext;
use audita_types::Sigma;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a run needs, constructed explicitly by the caller.
#[derive(Clone, Debug)]
pub struct RunContext {
    run_id: Uuid,
    policy_unit_id: String,
    correlation_id: String,
    sigma: Option<Sigma>,
    alpha: Option<f64>,
    fields: BTreeMap<String, Value>,
    calibration: Arc<CalibrationRegistry>,
    seeds: Arc<SeedRegistry>,
}

impl RunContext {
    /// `policy_unit_id` is also registered as a refusal field.
    pub fn new(policy_unit_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        let policy_unit_id = policy_unit_id.into();
        let correlation_id = correlation_id.into();
        let mut fields = BTreeMap::new();
        fields.insert("policy_unit_id".to_string(), Value::String(policy_unit_id.clone()));
        Self {
            run_id: Uuid::new_v4(),
            seeds: Arc::new(SeedRegistry::new(&policy_unit_id, &correlation_id)),
            policy_unit_id,
            correlation_id,
            sigma: None,
            alpha: None,
            fields,
            calibration: Arc::new(CalibrationRegistry::new()),
        }
    }

    pub fn with_sigma(mut self, sigma: Sigma) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationRegistry) -> Self {
        self.calibration = Arc::new(calibration);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn policy_unit_id(&self) -> &str {
        &self.policy_unit_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn sigma(&self) -> Option<&Sigma> {
        self.sigma.as_ref()
    }

    pub fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    pub fn calibration(&self) -> &CalibrationRegistry {
        &self.calibration
    }

    pub fn seeds(&self) -> &SeedRegistry {
        &self.seeds
    }

    pub fn refusal_context(&self) -> RefusalContext {
        RefusalContext {
            fields: self.fields.clone(),
            alpha: self.alpha,
            sigma: self.sigma.clone(),
        }
    }
}
