//! Risk Certificate: split-conformal threshold on calibration scores with an
//! empirical coverage check on a holdout set.
//!
//! The threshold is the `ceil((n + 1)(1 - alpha))`-th smallest calibration
//! score. Equal scores are ordered by keys drawn from a seeded RNG so the
//! reported rank is reproducible. Coverage must reach `1 - alpha - epsilon`,
//! where `epsilon` is the Hoeffding bound for the holdout size at confidence
//! `1 - delta`.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Failure probability used for the Hoeffding tolerance.
pub const DEFAULT_DELTA: f64 = 0.05;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskInput {
    /// Nonconformity scores used to fit the threshold.
    pub calibration: Vec<f64>,
    /// Scores the threshold is evaluated on.
    pub holdout: Vec<f64>,
    pub alpha: f64,
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub threshold: f64,
    /// 1-based rank of the threshold in the sorted calibration scores.
    pub threshold_rank: usize,
    /// Original calibration index of the selected score.
    pub threshold_source_index: usize,
    pub coverage: f64,
    pub target: f64,
    pub epsilon: f64,
    pub pass: bool,
}

#[derive(Clone, Debug)]
pub struct RiskCertificateContract {
    delta: f64,
}

impl Default for RiskCertificateContract {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
        }
    }
}

impl RiskCertificateContract {
    pub fn with_delta(delta: f64) -> Self {
        Self { delta }
    }

    /// Hoeffding tolerance for `m` holdout samples.
    pub fn hoeffding_epsilon(m: usize, delta: f64) -> f64 {
        if m == 0 {
            return 1.0;
        }
        ((2.0 / delta).ln() / (2.0 * m as f64)).sqrt()
    }

    fn validate(input: &RiskInput) -> Result<(), ContractError> {
        let invalid = |detail: String| ContractError::invalid(ContractKind::Risk, detail);
        if !(input.alpha > 0.0 && input.alpha < 1.0) {
            return Err(invalid(format!("alpha must be in (0, 1), got {}", input.alpha)));
        }
        if input.calibration.is_empty() {
            return Err(invalid("calibration data is empty".into()));
        }
        if input.holdout.is_empty() {
            return Err(invalid("holdout data is empty".into()));
        }
        if let Some(bad) = input
            .calibration
            .iter()
            .chain(input.holdout.iter())
            .find(|v| !v.is_finite())
        {
            return Err(invalid(format!("non-finite score {}", bad)));
        }
        Ok(())
    }

    pub fn compute(&self, input: &RiskInput) -> Result<RiskReport, ContractError> {
        Self::validate(input)?;
        let n = input.calibration.len();

        let mut rng = StdRng::seed_from_u64(input.seed);
        let mut ranked: Vec<(f64, u64, usize)> = input
            .calibration
            .iter()
            .enumerate()
            .map(|(i, score)| (*score, rng.gen::<u64>(), i))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let rank = (((n + 1) as f64) * (1.0 - input.alpha)).ceil() as usize;
        let rank = rank.clamp(1, n);
        let (threshold, _, source_index) = ranked[rank - 1];

        let covered = input.holdout.iter().filter(|s| **s <= threshold).count();
        let coverage = covered as f64 / input.holdout.len() as f64;
        let target = 1.0 - input.alpha;
        let epsilon = Self::hoeffding_epsilon(input.holdout.len(), self.delta);

        Ok(RiskReport {
            threshold,
            threshold_rank: rank,
            threshold_source_index: source_index,
            coverage,
            target,
            epsilon,
            pass: coverage >= target - epsilon,
        })
    }

    pub fn verify_risk(&self, input: &RiskInput) -> Result<ContractCertificate, ContractError> {
        let digest = inputs_digest(input)?;
        let report = self.compute(input)?;
        Ok(CertificateBuilder::new(ContractKind::Risk, digest)
            .check(report.pass, "coverage_bound", || {
                format!(
                    "coverage {:.4} below {:.4} (target {:.4} - epsilon {:.4})",
                    report.coverage,
                    report.target - report.epsilon,
                    report.target,
                    report.epsilon
                )
            })
            .field("alpha", &input.alpha)
            .field("seed", &input.seed)
            .field("threshold", &report.threshold)
            .field("threshold_rank", &report.threshold_rank)
            .field("coverage", &report.coverage)
            .field("epsilon", &report.epsilon)
            .field("calibration_size", &input.calibration.len())
            .field("holdout_size", &input.holdout.len())
            .seal())
    }
}

#[async_trait]
impl Contract for RiskCertificateContract {
    type Input = RiskInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Risk
    }

    async fn verify(&self, input: &RiskInput) -> Result<ContractCertificate, ContractError> {
        self.verify_risk(input)
    }
}

/// Exchangeable synthetic scores for probes: `n` uniform draws in [0, 1).
pub fn synthetic_scores(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen::<f64>()).collect()
}
