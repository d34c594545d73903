//! Failure & Fallback: degrade only on declared errors, deterministically.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::content_hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;

/// Result of [`execute_with_fallback`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub degraded: bool,
    /// Message of the declared error that triggered the fallback.
    pub cause: Option<String>,
}

/// Run `op`. A declared error (per `is_declared`) yields a clone of
/// `fallback`; any other error is returned unchanged.
pub fn execute_with_fallback<T, E, F, P>(
    op: F,
    fallback: &T,
    is_declared: P,
) -> Result<FallbackOutcome<T>, E>
where
    T: Clone,
    E: Display,
    F: FnOnce() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    match op() {
        Ok(value) => Ok(FallbackOutcome {
            value,
            degraded: false,
            cause: None,
        }),
        Err(e) if is_declared(&e) => {
            tracing::debug!(error = %e, "Declared failure, using fallback");
            Ok(FallbackOutcome {
                value: fallback.clone(),
                degraded: true,
                cause: Some(e.to_string()),
            })
        }
        Err(e) => Err(e),
    }
}

/// Error used by the contract's self-probe.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("declared failure: {0}")]
    Declared(String),
    #[error("undeclared failure: {0}")]
    Undeclared(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FallbackInput {
    pub fallback: Value,
    pub runs: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FailureFallbackContract;

impl FailureFallbackContract {
    /// Probe: `runs` declared failures must yield identical fallbacks, an
    /// undeclared failure must propagate as-is, and success must not degrade.
    pub fn verify_fallback(input: &FallbackInput) -> Result<ContractCertificate, ContractError> {
        if input.runs == 0 {
            return Err(ContractError::invalid(
                ContractKind::Fallback,
                "at least one run is required",
            ));
        }
        let digest = inputs_digest(input)?;
        let declared = |e: &ProbeError| matches!(e, ProbeError::Declared(_));

        let mut digests = Vec::with_capacity(input.runs);
        let mut all_degraded = true;
        for run in 0..input.runs {
            let outcome = execute_with_fallback(
                || Err(ProbeError::Declared(format!("run {}", run))),
                &input.fallback,
                declared,
            );
            match outcome {
                Ok(o) => {
                    all_degraded &= o.degraded;
                    digests.push(content_hash(&o.value)?);
                }
                Err(e) => {
                    return Ok(CertificateBuilder::new(ContractKind::Fallback, digest)
                        .violation("declared_caught", format!("declared error escaped: {}", e))
                        .seal())
                }
            }
        }
        let identical = digests.windows(2).all(|w| w[0] == w[1]);

        let undeclared = ProbeError::Undeclared("boom".into());
        let propagated = execute_with_fallback(
            || Err::<Value, _>(undeclared.clone()),
            &input.fallback,
            declared,
        );
        let propagated_unchanged = matches!(&propagated, Err(e) if *e == undeclared);

        let success = execute_with_fallback(
            || Ok::<_, ProbeError>(Value::Bool(true)),
            &input.fallback,
            declared,
        );
        let success_untouched = matches!(&success, Ok(o) if !o.degraded && o.value == Value::Bool(true));

        Ok(CertificateBuilder::new(ContractKind::Fallback, digest)
            .check(all_degraded && identical, "deterministic_fallback", || {
                "repeated declared failures produced differing fallbacks".into()
            })
            .check(propagated_unchanged, "undeclared_propagates", || {
                "an undeclared error was swallowed or altered".into()
            })
            .check(success_untouched, "success_passthrough", || {
                "a successful operation was degraded".into()
            })
            .field("runs", &input.runs)
            .field("fallback_digest", &digests[0])
            .seal())
    }
}

#[async_trait]
impl Contract for FailureFallbackContract {
    type Input = FallbackInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Fallback
    }

    async fn verify(&self, input: &FallbackInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_fallback(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum LoadError {
        #[error("source unavailable")]
        Unavailable,
        #[error("corrupt payload at byte {0}")]
        Corrupt(usize),
    }

    fn is_unavailable(e: &LoadError) -> bool {
        matches!(e, LoadError::Unavailable)
    }

    #[test]
    fn declared_error_yields_identical_fallback_twice() {
        let fallback = json!({"score": 0, "source": "default"});
        let a = execute_with_fallback(|| Err(LoadError::Unavailable), &fallback, is_unavailable)
            .unwrap();
        let b = execute_with_fallback(|| Err(LoadError::Unavailable), &fallback, is_unavailable)
            .unwrap();
        assert_eq!(a, b);
        assert!(a.degraded);
        assert_eq!(a.cause.as_deref(), Some("source unavailable"));
    }

    #[test]
    fn undeclared_error_propagates_unchanged() {
        let result = execute_with_fallback(|| Err::<Value, _>(LoadError::Corrupt(17)), &json!(null), is_unavailable);
        assert_eq!(result.unwrap_err(), LoadError::Corrupt(17));
    }

    #[test]
    fn success_passes_through() {
        let out = execute_with_fallback(|| Ok::<_, LoadError>(5), &0, is_unavailable).unwrap();
        assert_eq!(out.value, 5);
        assert!(!out.degraded);
    }

    #[test]
    fn certificate_passes() {
        let cert = FailureFallbackContract::verify_fallback(&FallbackInput {
            fallback: json!({"label": "UNSAT"}),
            runs: 3,
        })
        .unwrap();
        assert!(cert.pass, "{:?}", cert.violation);
    }

    #[test]
    fn zero_runs_rejected() {
        assert!(FailureFallbackContract::verify_fallback(&FallbackInput {
            fallback: json!(0),
            runs: 0,
        })
        .is_err());
    }
}
