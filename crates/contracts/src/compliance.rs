//! Monotone Compliance: adding evidence never lowers the compliance label.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Requirement sets for each label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRules {
    pub sat: BTreeSet<String>,
    pub partial: BTreeSet<String>,
}

impl ComplianceRules {
    pub fn new<I, J, S>(sat: I, partial: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sat: sat.into_iter().map(Into::into).collect(),
            partial: partial.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceInput {
    pub rules: ComplianceRules,
    pub evidence: BTreeSet<String>,
    pub extended: BTreeSet<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MonotoneComplianceContract;

impl MonotoneComplianceContract {
    /// SAT when every SAT requirement is present, else PARTIAL when every
    /// PARTIAL requirement is present, else UNSAT.
    pub fn evaluate(evidence: &BTreeSet<String>, rules: &ComplianceRules) -> Label {
        if rules.sat.is_subset(evidence) {
            Label::Sat
        } else if rules.partial.is_subset(evidence) {
            Label::Partial
        } else {
            Label::Unsat
        }
    }

    /// Check `label(extended) >= label(evidence)`. Errors when `evidence` is
    /// not a subset of `extended`.
    pub fn verify_monotonicity(
        evidence: &BTreeSet<String>,
        extended: &BTreeSet<String>,
        rules: &ComplianceRules,
    ) -> Result<ContractCertificate, ContractError> {
        if !evidence.is_subset(extended) {
            return Err(ContractError::NotSubset {
                missing: evidence.difference(extended).cloned().collect(),
            });
        }
        let digest = inputs_digest(&(rules, evidence, extended))?;
        let before = Self::evaluate(evidence, rules);
        let after = Self::evaluate(extended, rules);
        Ok(CertificateBuilder::new(ContractKind::Compliance, digest)
            .check(after >= before, "label_monotone", || {
                format!("label dropped from {} to {}", before, after)
            })
            .field("label_before", &before)
            .field("label_after", &after)
            .seal())
    }
}

#[async_trait]
impl Contract for MonotoneComplianceContract {
    type Input = ComplianceInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Compliance
    }

    async fn verify(&self, input: &ComplianceInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_monotonicity(&input.evidence, &input.extended, &input.rules)
    }
}
