//! Total Ordering: ascending sort by a primary key with a deterministic
//! secondary key, so equal-key groups never depend on insertion order.

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::content_hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Totally ordered `f64` for sort keys (IEEE 754 total order).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderedScore(pub f64);

impl Eq for OrderedScore {}

impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sort by `key` ascending; ties broken by the item's content hash.
pub fn stable_sort<T, K, F>(items: &[T], key: F) -> Result<Vec<T>, ContractError>
where
    T: Serialize + Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut decorated = items
        .iter()
        .map(|item| -> Result<_, ContractError> { Ok((key(item), content_hash(item)?, item)) })
        .collect::<Result<Vec<_>, _>>()?;
    decorated.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(decorated.into_iter().map(|(_, _, item)| item.clone()).collect())
}

/// Sort by `key` ascending; ties broken by an explicit `secondary` key.
/// Items equal on both keys keep their relative input order.
pub fn stable_sort_by<T, K, S, F, G>(items: &[T], key: F, secondary: G) -> Vec<T>
where
    T: Clone,
    K: Ord,
    S: Ord,
    F: Fn(&T) -> K,
    G: Fn(&T) -> S,
{
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(&key(b)).then_with(|| secondary(a).cmp(&secondary(b))));
    sorted
}

/// Records to sort, the numeric key field, and an optional tie-break field
/// (content hash when absent).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderingInput {
    pub items: Vec<Value>,
    pub key_field: String,
    #[serde(default)]
    pub tie_break_field: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TotalOrderingContract;

impl TotalOrderingContract {
    fn score(item: &Value, field: &str) -> OrderedScore {
        OrderedScore(item.get(field).and_then(Value::as_f64).unwrap_or(f64::NAN))
    }

    fn tie(item: &Value, field: &str) -> String {
        match item.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Sort `input.items` according to its key and tie-break fields.
    pub fn sort(input: &OrderingInput) -> Result<Vec<Value>, ContractError> {
        let key = |v: &Value| Self::score(v, &input.key_field);
        match &input.tie_break_field {
            Some(tie) => Ok(stable_sort_by(&input.items, key, |v| Self::tie(v, tie))),
            None => stable_sort(&input.items, key),
        }
    }

    /// Sort twice and once more from reversed input; all three must agree.
    pub fn verify_ordering(input: &OrderingInput) -> Result<ContractCertificate, ContractError> {
        let digest = inputs_digest(input)?;
        if let Some(bad) = input
            .items
            .iter()
            .position(|v| v.get(&input.key_field).and_then(Value::as_f64).is_none())
        {
            return Err(ContractError::invalid(
                ContractKind::Ordering,
                format!("item {} has no numeric '{}'", bad, input.key_field),
            ));
        }

        let first = Self::sort(input)?;
        let second = Self::sort(input)?;
        let mut reversed = input.clone();
        reversed.items.reverse();
        let from_reversed = Self::sort(&reversed)?;

        let first_hash = content_hash(&first)?;
        Ok(CertificateBuilder::new(ContractKind::Ordering, digest)
            .check(first == second, "rerun_stable", || {
                "re-running the sort changed the order".into()
            })
            .check(first == from_reversed, "insertion_independent", || {
                "reversed insertion order changed the sorted output".into()
            })
            .field("ordered_digest", &first_hash)
            .field("item_count", &first.len())
            .field(
                "tie_break",
                input.tie_break_field.as_deref().unwrap_or("content_hash"),
            )
            .seal())
    }
}

#[async_trait]
impl Contract for TotalOrderingContract {
    type Input = OrderingInput;

    fn kind(&self) -> ContractKind {
        ContractKind::Ordering
    }

    async fn verify(&self, input: &OrderingInput) -> Result<ContractCertificate, ContractError> {
        Self::verify_ordering(input)
    }
}
