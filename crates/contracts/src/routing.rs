//! Routing: deterministic selection of which candidates a question is routed
//! through, from (context hash, θ, σ, budget, seed).

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{content_hash, ContentHash, Sigma};
use serde::{Deserialize, Serialize};

pub const TIE_BREAK_POLICY: &str = "lexicographic";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub id: String,
    pub score: f64,
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingInputs {
    pub context_hash: String,
    /// Minimum score for a candidate to be eligible.
    pub theta: f64,
    pub sigma: Sigma,
    pub budget: f64,
    /// Bound into `route_hash` only. Selection is fully determined by score,
    /// then id, so the seed never changes which candidates are routed.
    pub seed: u64,
    pub candidates: Vec<RouteCandidate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Selected candidate ids in route order.
    pub steps: Vec<String>,
    pub total_cost: f64,
    pub route_hash: ContentHash,
}

#[derive(Serialize)]
struct RouteRecord<'a> {
    inputs_digest: &'a ContentHash,
    steps: &'a [String],
    tie_break: &'static str,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RoutingContract;

impl RoutingContract {
    /// Eligible candidates (`score >= theta`) ordered by score descending then
    /// id ascending, taken greedily while the budget allows. Candidates that
    /// do not fit are skipped.
    pub fn compute_route(inputs: &RoutingInputs) -> Result<Route, ContractError> {
        let invalid = |detail: String| ContractError::invalid(ContractKind::Routing, detail);
        if inputs.context_hash.trim().is_empty() {
            return Err(invalid("context_hash must not be empty".into()));
        }
        if !inputs.sigma.is_complete() {
            return Err(invalid("sigma snapshot is incomplete".into()));
        }
        if !inputs.theta.is_finite() || !inputs.budget.is_finite() {
            return Err(invalid("theta and budget must be finite".into()));
        }
        if let Some(bad) = inputs
            .candidates
            .iter()
            .find(|c| !c.score.is_finite() || !c.cost.is_finite() || c.cost < 0.0)
        {
            return Err(invalid(format!("candidate '{}' has invalid score or cost", bad.id)));
        }

        let mut eligible: Vec<&RouteCandidate> = inputs
            .candidates
            .iter()
            .filter(|c| c.score >= inputs.theta)
            .collect();
        eligible.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

        let mut steps = Vec::new();
        let mut total_cost = 0.0;
        for candidate in eligible {
            if total_cost + candidate.cost <= inputs.budget {
                total_cost += candidate.cost;
                steps.push(candidate.id.clone());
            }
        }

        let digest = inputs_digest(inputs)?;
        let route_hash = content_hash(&RouteRecord {
            inputs_digest: &digest,
            steps: &steps,
            tie_break: TIE_BREAK_POLICY,
        })?;
        Ok(Route {
            steps,
            total_cost,
            route_hash,
        })
    }

    pub fn verify_route(inputs: &RoutingInputs) -> Result<ContractCertificate, ContractError> {
        let first = Self::compute_route(inputs)?;
        let second = Self::compute_route(inputs)?;
        Ok(CertificateBuilder::new(ContractKind::Routing, inputs_digest(inputs)?)
            .check(first == second, "route_reproducible", || {
                "identical inputs produced different routes".into()
            })
            .check(first.total_cost <= inputs.budget, "within_budget", || {
                format!("route cost {} exceeds budget {}", first.total_cost, inputs.budget)
            })
            .field("route_hash", &first.route_hash)
            .field("route", &first.steps)
            .field("total_cost", &first.total_cost)
            .field("tie_break_policy", TIE_BREAK_POLICY)
            .seal())
    }
}

#[async_trait]
impl Contract for RoutingContract {
    type Input = RoutingInputs;

    fn kind(&self) -> ContractKind {
        ContractKind::Routing
    }

    async fn verify(&self, input: &RoutingInputs) -> Result<ContractCertificate, ContractError> {
        Self::verify_route(input)
    }
}
