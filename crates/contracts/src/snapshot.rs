//! Snapshot: a run may only proceed against a complete environment
//! snapshot (standards, corpus and index hashes).

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::{ContractError, RefusalClause, RefusalError};
use async_trait::async_trait;
use audita_types::{ContentHash, Sigma, SigmaKey};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotContract;

fn refusal(missing: &[SigmaKey]) -> RefusalError {
    let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
    RefusalError::new(
        RefusalClause::Snapshot,
        format!("snapshot incomplete: missing {}", names.join(", ")),
    )
}

impl SnapshotContract {
    /// Validate a loose key/value snapshot and return its digest.
    pub fn verify_snapshot(map: &BTreeMap<String, String>) -> Result<(Sigma, ContentHash), RefusalError> {
        let sigma = Sigma::from_map(map).map_err(|missing| refusal(&missing))?;
        let digest = sigma.digest();
        Ok((sigma, digest))
    }

    /// Validate an already-typed snapshot.
    pub fn verify_sigma(sigma: &Sigma) -> Result<ContentHash, RefusalError> {
        let missing = sigma.missing_keys();
        if !missing.is_empty() {
            return Err(refusal(&missing));
        }
        Ok(sigma.digest())
    }
}

#[async_trait]
impl Contract for SnapshotContract {
    type Input = BTreeMap<String, String>;

    fn kind(&self) -> ContractKind {
        ContractKind::Snapshot
    }

    async fn verify(
        &self,
        input: &BTreeMap<String, String>,
    ) -> Result<ContractCertificate, ContractError> {
        let (sigma, digest) = Self::verify_snapshot(input)?;
        Ok(CertificateBuilder::new(ContractKind::Snapshot, inputs_digest(&sigma)?)
            .field("sigma_digest", &digest)
            .field("sigma", &sigma.to_map())
            .seal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_and_partial_refuse() {
        let err = SnapshotContract::verify_snapshot(&map(&[])).unwrap_err();
        assert_eq!(err.clause, RefusalClause::Snapshot);
        assert_eq!(
            err.message,
            "snapshot incomplete: missing standards_hash, corpus_hash, index_hash"
        );
        let err = SnapshotContract::verify_snapshot(&map(&[("standards_hash", "x")])).unwrap_err();
        assert_eq!(err.message, "snapshot incomplete: missing corpus_hash, index_hash");
    }

    #[test]
    fn complete_sigma_has_stable_digest() {
        let m = map(&[
            ("standards_hash", "s"),
            ("corpus_hash", "c"),
            ("index_hash", "i"),
        ]);
        let (_, a) = SnapshotContract::verify_snapshot(&m).unwrap();
        let (_, b) = SnapshotContract::verify_snapshot(&m).unwrap();
        assert_eq!(a, b);
        assert_eq!(SnapshotContract::verify_sigma(&Sigma::new("s", "c", "i")).unwrap(), a);
    }

    #[tokio::test]
    async fn contract_refuses_through_trait() {
        let err = SnapshotContract.verify(&map(&[])).await.unwrap_err();
        assert!(err.is_refusal());
    }
}
