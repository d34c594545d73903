use crate::certificate::ContractKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prerequisite clause that refused to proceed. Clauses are evaluated in
/// declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalClause {
    MandatoryFields,
    AlphaBound,
    SigmaPresent,
    Snapshot,
}

impl RefusalClause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MandatoryFields => "mandatory_fields",
            Self::AlphaBound => "alpha_bound",
            Self::SigmaPresent => "sigma_present",
            Self::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for RefusalClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deliberate refusal to proceed because a prerequisite is unmet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("refused [{clause}]: {message}")]
pub struct RefusalError {
    pub clause: RefusalClause,
    pub message: String,
}

impl RefusalError {
    pub fn new(clause: RefusalClause, message: impl Into<String>) -> Self {
        Self {
            clause,
            message: message.into(),
        }
    }
}

/// Errors raised by contract verifiers.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The contract's property does not hold.
    #[error("{contract} violated clause '{clause}': {detail}")]
    Violation {
        contract: ContractKind,
        clause: String,
        detail: String,
    },

    #[error(transparent)]
    Refusal(#[from] RefusalError),

    /// Inputs the verifier cannot evaluate.
    #[error("{contract}: invalid input: {detail}")]
    InvalidInput {
        contract: ContractKind,
        detail: String,
    },

    /// `E ⊆ E'` does not hold for a monotonicity check.
    #[error("evidence set is not a subset of its extension; missing: {}", .missing.join(", "))]
    NotSubset { missing: Vec<String> },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("certificate I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn invalid(contract: ContractKind, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            contract,
            detail: detail.into(),
        }
    }

    /// Whether this error is a refusal (prerequisite or snapshot).
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refusal(_))
    }
}

impl From<audita_types::CanonicalError> for ContractError {
    fn from(e: audita_types::CanonicalError) -> Self {
        Self::Serialization(e.to_string())
    }
}
