//! Refusal: ordered prerequisite clauses that stop a run with a stable,
//! explanatory message instead of producing a degraded result.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::{ContractError, RefusalClause, RefusalError};
use async_trait::async_trait;
use audita_types::Sigma;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a run must provide before it may proceed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefusalPolicy {
    /// Fields that must be present, non-null and non-blank, checked in order.
    pub mandatory_fields: Vec<String>,
    /// Exclusive lower bound for alpha.
    pub alpha_min: f64,
    /// Inclusive upper bound for alpha.
    pub alpha_max: f64,
    pub require_sigma: bool,
}

impl Default for RefusalPolicy {
    fn default() -> Self {
        Self {
            mandatory_fields: vec!["policy_unit_id".into()],
            alpha_min: 0.0,
            alpha_max: 0.5,
            require_sigma: true,
        }
    }
}

/// The values a refusal check is evaluated against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefusalContext {
    pub fields: BTreeMap<String, Value>,
    pub alpha: Option<f64>,
    pub sigma: Option<Sigma>,
}

impl RefusalContext {
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn with_sigma(mut self, sigma: Sigma) -> Self {
        self.sigma = Some(sigma);
        self
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[derive(Clone, Debug, Default)]
pub struct RefusalContract {
    policy: RefusalPolicy,
}

impl RefusalContract {
    pub fn new(policy: RefusalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RefusalPolicy {
        &self.policy
    }

    /// Evaluate the clauses in order: mandatory fields, then alpha bound,
    /// then sigma presence. The first failing clause is returned.
    pub fn check_prerequisites(&self, ctx: &RefusalContext) -> Result<(), RefusalError> {
        for field in &self.policy.mandatory_fields {
            if ctx.fields.get(field).map_or(true, is_blank) {
                return Err(RefusalError::new(
                    RefusalClause::MandatoryFields,
                    format!("mandatory field '{}' is missing", field),
                ));
            }
        }

        let (min, max) = (self.policy.alpha_min, self.policy.alpha_max);
        match ctx.alpha {
            None => {
                return Err(RefusalError::new(
                    RefusalClause::AlphaBound,
                    "alpha is not set",
                ))
            }
            Some(alpha) if !(alpha > min && alpha <= max) => {
                return Err(RefusalError::new(
                    RefusalClause::AlphaBound,
                    format!("alpha {} outside ({}, {}]", alpha, min, max),
                ))
            }
            Some(_) => {}
        }

        if self.policy.require_sigma {
            let Some(sigma) = &ctx.sigma else {
                return Err(RefusalError::new(
                    RefusalClause::SigmaPresent,
                    "sigma snapshot is required but absent",
                ));
            };
            let missing = sigma.missing_keys();
            if !missing.is_empty() {
                let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
                return Err(RefusalError::new(
                    RefusalClause::SigmaPresent,
                    format!("sigma is missing {}", names.join(", ")),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Contract for RefusalContract {
    type Input = RefusalContext;

    fn kind(&self) -> ContractKind {
        ContractKind::Refusal
    }

    async fn verify(&self, input: &RefusalContext) -> Result<ContractCertificate, ContractError> {
        self.check_prerequisites(input)?;
        let digest = inputs_digest(&(&self.policy, input))?;
        Ok(CertificateBuilder::new(ContractKind::Refusal, digest)
            .field(
                "clauses",
                &[
                    RefusalClause::MandatoryFields,
                    RefusalClause::AlphaBound,
                    RefusalClause::SigmaPresent,
                ],
            )
            .field("mandatory_fields", &self.policy.mandatory_fields)
            .seal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RefusalContext {
        RefusalContext::default()
            .with_field("policy_unit_id", "PU-001")
            .with_alpha(0.1)
            .with_sigma(Sigma::new("s", "c", "i"))
    }

    #[test]
    fn complete_context_passes() {
        assert!(RefusalContract::default()
            .check_prerequisites(&complete())
            .is_ok());
    }

    #[test]
    fn mandatory_field_checked_first() {
        let ctx = RefusalContext::default().with_alpha(0.9);
        let err = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        assert_eq!(err.clause, RefusalClause::MandatoryFields);
        assert_eq!(err.message, "mandatory field 'policy_unit_id' is missing");
    }

    #[test]
    fn blank_field_is_missing() {
        let ctx = complete().with_field("policy_unit_id", "  ");
        let err = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        assert_eq!(err.clause, RefusalClause::MandatoryFields);
    }

    #[test]
    fn alpha_bounds() {
        let contract = RefusalContract::default();
        for alpha in [0.0, -0.1, 0.51, f64::NAN] {
            let err = contract
                .check_prerequisites(&complete().with_alpha(alpha))
                .unwrap_err();
            assert_eq!(err.clause, RefusalClause::AlphaBound, "alpha {}", alpha);
        }
        assert!(contract.check_prerequisites(&complete().with_alpha(0.5)).is_ok());
    }

    #[test]
    fn sigma_checked_last() {
        let mut ctx = complete();
        ctx.sigma = None;
        let err = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        assert_eq!(err.clause, RefusalClause::SigmaPresent);

        let ctx = complete().with_sigma(Sigma::new("s", "", "i"));
        let err = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        assert_eq!(err.message, "sigma is missing corpus_hash");
    }

    #[test]
    fn message_is_stable() {
        let ctx = RefusalContext::default();
        let a = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        let b = RefusalContract::default().check_prerequisites(&ctx).unwrap_err();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn verify_returns_refusal_error() {
        let err = RefusalContract::default()
            .verify(&RefusalContext::default())
            .await
            .unwrap_err();
        assert!(err.is_refusal());
        let cert = RefusalContract::default().verify(&complete()).await.unwrap();
        assert!(cert.pass);
    }
}
