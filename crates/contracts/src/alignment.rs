//! Alignment Stability: entropic optimal transport (Sinkhorn) between policy
//! sections and standards, with a reproducible plan digest.
//!
//! Cost is `1 - cosine(section, standard)`; marginals are uniform. The plan is
//! quantized to `PLAN_SCALE` before hashing so the digest does not depend on
//! the last bits of floating-point noise.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{content_hash, ContentHash};
use serde::{Deserialize, Serialize};

const PLAN_SCALE: f64 = 1e9;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentItem {
    pub id: String,
    pub vector: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Entropic regularization.
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Stop when the largest marginal violation falls below this.
    pub tolerance: f64,
    /// Pairs costlier than this count toward unmatched mass.
    pub unmatched_cost: f64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            max_iterations: 500,
            tolerance: 1e-9,
            unmatched_cost: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub plan_digest: ContentHash,
    /// Transport cost `Σ P·C`.
    pub cost: f64,
    pub unmatched_mass: f64,
    pub iterations: usize,
    pub converged: bool,
    /// `plan[i][j]`: mass moved from section i to standard j.
    pub plan: Vec<Vec<f64>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlignmentInput {
    pub sections: Vec<AlignmentItem>,
    pub standards: Vec<AlignmentItem>,
    #[serde(default)]
    pub params: AlignmentParams,
}

fn cosine_cost(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[derive(Serialize)]
struct PlanRecord<'a> {
    sections: Vec<&'a str>,
    standards: Vec<&'a str>,
    plan: Vec<Vec<i64>>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlignmentStabilityContract;

impl AlignmentStabilityContract {
    fn validate(
        sections: &[AlignmentItem],
        standards: &[AlignmentItem],
        params: &AlignmentParams,
    ) -> Result<usize, ContractError> {
        let invalid = |detail: String| ContractError::invalid(ContractKind::Alignment, detail);
        if sections.is_empty() || standards.is_empty() {
            return Err(invalid("sections and standards must be non-empty".into()));
        }
        if !(params.epsilon > 0.0 && params.epsilon.is_finite()) {
            return Err(invalid(format!("epsilon must be positive, got {}", params.epsilon)));
        }
        let dim = sections[0].vector.len();
        if dim == 0 {
            return Err(invalid("vectors must be non-empty".into()));
        }
        for item in sections.iter().chain(standards) {
            if item.vector.len() != dim {
                return Err(invalid(format!(
                    "'{}' has dimension {}, expected {}",
                    item.id,
                    item.vector.len(),
                    dim
                )));
            }
            if item.vector.iter().any(|v| !v.is_finite()) {
                return Err(invalid(format!("'{}' has non-finite components", item.id)));
            }
        }
        Ok(dim)
    }

    pub fn compute_alignment(
        sections: &[AlignmentItem],
        standards: &[AlignmentItem],
        params: &AlignmentParams,
    ) -> Result<AlignmentResult, ContractError> {
        Self::validate(sections, standards, params)?;
        let (n, m) = (sections.len(), standards.len());
        let a = 1.0 / n as f64;
        let b = 1.0 / m as f64;

        let cost: Vec<Vec<f64>> = sections
            .iter()
            .map(|s| standards.iter().map(|t| cosine_cost(&s.vector, &t.vector)).collect())
            .collect();
        let kernel: Vec<Vec<f64>> = cost
            .iter()
            .map(|row| row.iter().map(|c| (-c / params.epsilon).exp()).collect())
            .collect();

        let mut u = vec![1.0; n];
        let mut v = vec![1.0; m];
        let mut iterations = 0;
        let mut converged = false;
        while iterations < params.max_iterations {
            iterations += 1;
            for i in 0..n {
                let kv: f64 = (0..m).map(|j| kernel[i][j] * v[j]).sum();
                u[i] = if kv > 0.0 { a / kv } else { 0.0 };
            }
            for j in 0..m {
                let ku: f64 = (0..n).map(|i| kernel[i][j] * u[i]).sum();
                v[j] = if ku > 0.0 { b / ku } else { 0.0 };
            }
            // Column marginals are exact after the v-update; check rows.
            let violation = (0..n)
                .map(|i| {
                    let row: f64 = (0..m).map(|j| u[i] * kernel[i][j] * v[j]).sum();
                    (row - a).abs()
                })
                .fold(0.0_f64, f64::max);
            if violation < params.tolerance {
                converged = true;
                break;
            }
        }

        let plan: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..m).map(|j| u[i] * kernel[i][j] * v[j]).collect())
            .collect();
        let mut total_cost = 0.0;
        let mut unmatched_mass = 0.0;
        for i in 0..n {
            for j in 0..m {
                total_cost += plan[i][j] * cost[i][j];
                if cost[i][j] > params.unmatched_cost {
                    unmatched_mass += plan[i][j];
                }
            }
        }

        let record = PlanRecord {
            sections: sections.iter().map(|s| s.id.as_str()).collect(),
            standards: standards.iter().map(|s| s.id.as_str()).collect(),
            plan: plan
                .iter()
                .map(|row| row.iter().map(|p| (p * PLAN_SCALE).round() as i64).collect())
                .collect(),
        };
        Ok(AlignmentResult {
            plan_digest: content_hash(&record)?,
            cost: total_cost,
            unmatched_mass,
            iterations,
            converged,
            plan,
        })
    }

    /// Compute twice; the digests must match and the plan must be a valid
    /// coupling (total mass 1).
    pub fn verify_alignment(input: &AlignmentInput) -> Result<ContractCertificate, ContractError> {
        let first = Self::compute_alignment(&input.sections, &input.standards, &input.params)?;
        let second = Self::compute_alignment(&input.sections, &input.standards, &input.params)?;
        let mass: f64 = first.plan.iter().flatten().sum();
        Ok(CertificateBuilder::new(ContractKind::Alignment, inputs_digest(input)?)
            .check(first.plan_digest == second.plan_digest, "digest_reproducible", || {
                "identical inputs produced different plan digests".into()
            })
            .check((mass - 1.0).abs() < 1e-6, "mass_conserved", || {
                format!("plan mass {} differs from 1", mass)
            })
            .field("plan_digest", &first.plan_digest)
            .field("cost", &first.cost)
            .field("unmatched_mass", &first.unmatched_mass)
            .field("iterations", &first.iterations)
            .field("converged", &first.converged)
            .seal())
    }
}

#[async_trait]
impl Contract for AlignmentStabilityContract {
    type Input = AlignmentInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Alignment
    }

    async fn verify(&self, input: &AlignmentInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_alignment(input)
    }
}
