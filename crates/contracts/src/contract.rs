use crate::certificate::{ContractCertificate, ContractKind};
use crate::error::ContractError;
use async_trait::async_trait;

/// A pure verifier over explicit inputs.
///
/// `verify` returns a sealed certificate whose `pass` flag records whether the
/// property held. Inputs that cannot be evaluated, and refusals, are errors.
/// Implementations never mutate pipeline state.
#[async_trait]
pub trait Contract: Send + Sync {
    type Input: Send + Sync;

    fn kind(&self) -> ContractKind;

    async fn verify(&self, input: &Self::Input) -> Result<ContractCertificate, ContractError>;
}
