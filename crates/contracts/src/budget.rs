//! Budget & Monotonicity: deterministic selection under a cost budget whose
//! selected sets grow monotonically with the budget.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Items (id → cost) and the budgets to check.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BudgetInput {
    pub items: BTreeMap<String, f64>,
    pub budgets: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BudgetMonotonicityContract;

impl BudgetMonotonicityContract {
    /// Select the largest affordable set: items ordered by (cost, id), taken
    /// as a prefix while the running total stays within `budget`.
    ///
    /// Because the selection is always a prefix of one fixed order, a larger
    /// budget can only extend it.
    pub fn solve(
        items: &BTreeMap<String, f64>,
        budget: f64,
    ) -> Result<BTreeSet<String>, ContractError> {
        if !budget.is_finite() {
            return Err(ContractError::invalid(
                ContractKind::Budget,
                format!("budget must be finite, got {}", budget),
            ));
        }
        for (id, cost) in items {
            if !cost.is_finite() || *cost < 0.0 {
                return Err(ContractError::invalid(
                    ContractKind::Budget,
                    format!("item '{}' has invalid cost {}", id, cost),
                ));
            }
        }

        let mut ordered: Vec<(&String, f64)> = items.iter().map(|(id, c)| (id, *c)).collect();
        ordered.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut spent = 0.0;
        let mut selected = BTreeSet::new();
        for (id, cost) in ordered {
            if spent + cost > budget {
                break;
            }
            spent += cost;
            selected.insert(id.clone());
        }
        Ok(selected)
    }

    /// Solve for every budget (ascending) and check `S(B1) ⊆ S(B2) ⊆ …`.
    pub fn verify_monotonicity(
        items: &BTreeMap<String, f64>,
        budgets: &[f64],
    ) -> Result<ContractCertificate, ContractError> {
        if budgets.is_empty() {
            return Err(ContractError::invalid(
                ContractKind::Budget,
                "at least one budget is required",
            ));
        }
        let digest = inputs_digest(&BudgetInput {
            items: items.clone(),
            budgets: budgets.to_vec(),
        })?;

        let mut sorted = budgets.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut selections = Vec::with_capacity(sorted.len());
        for budget in &sorted {
            selections.push(Self::solve(items, *budget)?);
        }

        let mut builder = CertificateBuilder::new(ContractKind::Budget, digest);
        for (i, pair) in selections.windows(2).enumerate() {
            let (smaller, larger) = (&pair[0], &pair[1]);
            builder = builder.check(smaller.is_subset(larger), "subset_chain", || {
                let escaped: Vec<&String> = smaller.difference(larger).collect();
                format!(
                    "selection at budget {} is not contained in selection at budget {}: {:?}",
                    sorted[i],
                    sorted[i + 1],
                    escaped
                )
            });
        }

        let listed: Vec<Vec<&String>> = selections.iter().map(|s| s.iter().collect()).collect();
        Ok(builder
            .field("budgets", &sorted)
            .field("selections", &listed)
            .field(
                "selected_counts",
                &selections.iter().map(BTreeSet::len).collect::<Vec<_>>(),
            )
            .field("tie_break", "cost_then_id")
            .seal())
    }
}

#[async_trait]
impl Contract for BudgetMonotonicityContract {
    type Input = BudgetInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Budget
    }

    async fn verify(&self, input: &BudgetInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_monotonicity(&input.items, &input.budgets)
    }
}
