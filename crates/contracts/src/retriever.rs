//! Retriever: top-K retrieval must be a deterministic function of
//! (query, filters, index).

use crate::certificate::{inputs_digest, CertificateBuilder, ContractCertificate, ContractKind};
use crate::contract::Contract;
use crate::error::ContractError;
use async_trait::async_trait;
use audita_types::{content_hash, ContentHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One ranked hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub id: String,
    pub score: f64,
}

/// Retrieval backend. Implementations must rank ties by id.
pub trait Retriever: Send + Sync {
    fn top_k(&self, query: &str, filters: &BTreeMap<String, String>, k: usize) -> Vec<RetrievedDoc>;
}

/// A document in the lexical index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedDoc {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Term-overlap retriever: score is the fraction of query terms present in
/// the document. Documents must match every filter exactly.
#[derive(Clone, Debug, Default)]
pub struct LexicalRetriever {
    docs: Vec<(IndexedDoc, BTreeSet<String>)>,
}

impl LexicalRetriever {
    pub fn new(docs: Vec<IndexedDoc>) -> Self {
        Self {
            docs: docs
                .into_iter()
                .map(|d| {
                    let terms = tokens(&d.text);
                    (d, terms)
                })
                .collect(),
        }
    }

    /// A copy of this index with one more document.
    pub fn with_doc(&self, doc: IndexedDoc) -> Self {
        let mut docs: Vec<IndexedDoc> = self.docs.iter().map(|(d, _)| d.clone()).collect();
        docs.push(doc);
        Self::new(docs)
    }

    /// Digest of the indexed corpus, usable as `index_hash`.
    pub fn index_hash(&self) -> Result<ContentHash, ContractError> {
        let docs: Vec<&IndexedDoc> = self.docs.iter().map(|(d, _)| d).collect();
        Ok(content_hash(&docs)?)
    }
}

impl Retriever for LexicalRetriever {
    fn top_k(&self, query: &str, filters: &BTreeMap<String, String>, k: usize) -> Vec<RetrievedDoc> {
        let query_terms = tokens(query);
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut hits: Vec<RetrievedDoc> = self
            .docs
            .iter()
            .filter(|(doc, _)| {
                filters
                    .iter()
                    .all(|(key, value)| doc.attributes.get(key) == Some(value))
            })
            .filter_map(|(doc, terms)| {
                let matched = query_terms.intersection(terms).count();
                (matched > 0).then(|| RetrievedDoc {
                    id: doc.id.clone(),
                    score: matched as f64 / query_terms.len() as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        hits
    }
}

#[derive(Serialize)]
struct RetrievalRecord<'a> {
    index_hash: &'a str,
    query: &'a str,
    filters: &'a BTreeMap<String, String>,
    k: usize,
    results: &'a [RetrievedDoc],
}

/// Digest binding the index, the request and the ranked results.
pub fn retrieval_digest(
    index_hash: &str,
    query: &str,
    filters: &BTreeMap<String, String>,
    k: usize,
    results: &[RetrievedDoc],
) -> Result<ContentHash, ContractError> {
    Ok(content_hash(&RetrievalRecord {
        index_hash,
        query,
        filters,
        k,
        results,
    })?)
}

/// A retriever over a modified index, with that index's hash.
#[derive(Clone)]
pub struct IndexVariant {
    pub retriever: Arc<dyn Retriever>,
    pub index_hash: String,
}

pub struct RetrievalProbe {
    pub retriever: Arc<dyn Retriever>,
    pub query: String,
    pub filters: BTreeMap<String, String>,
    pub index_hash: String,
    /// When set, the digest must change once retrieval runs against it.
    pub variant: Option<IndexVariant>,
}

#[derive(Clone, Debug)]
pub struct RetrieverContract {
    k: usize,
}

impl Default for RetrieverContract {
    fn default() -> Self {
        Self { k: 10 }
    }
}

impl RetrieverContract {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    /// Retrieve twice and compare digests. With a `variant`, also retrieve
    /// against the modified index and require a different digest.
    pub fn verify_determinism(
        &self,
        retriever: &dyn Retriever,
        query: &str,
        filters: &BTreeMap<String, String>,
        index_hash: &str,
        variant: Option<&IndexVariant>,
    ) -> Result<ContractCertificate, ContractError> {
        if index_hash.trim().is_empty() {
            return Err(ContractError::invalid(
                ContractKind::Retriever,
                "index_hash must not be empty",
            ));
        }
        let digest = inputs_digest(&(
            query,
            filters,
            index_hash,
            self.k,
            variant.map(|v| v.index_hash.as_str()),
        ))?;

        let first = retriever.top_k(query, filters, self.k);
        let second = retriever.top_k(query, filters, self.k);
        let first_digest = retrieval_digest(index_hash, query, filters, self.k, &first)?;
        let second_digest = retrieval_digest(index_hash, query, filters, self.k, &second)?;

        let mut builder = CertificateBuilder::new(ContractKind::Retriever, digest).check(
            first_digest == second_digest,
            "same_inputs_same_digest",
            || "repeated retrieval produced a different top-K".into(),
        );
        if let Some(variant) = variant {
            let hits = variant.retriever.top_k(query, filters, self.k);
            let variant_digest =
                retrieval_digest(&variant.index_hash, query, filters, self.k, &hits)?;
            builder = builder
                .check(variant.index_hash != index_hash, "index_hash_distinct", || {
                    "modified index reports the same index_hash".into()
                })
                .check(variant_digest != first_digest, "index_bound", || {
                    "digest unchanged after retrieval against a modified index".into()
                })
                .field("variant_topk_digest", &variant_digest);
        }
        Ok(builder
            .field("index_binding_checked", &variant.is_some())
            .field("topk_digest", &first_digest)
            .field("k", &self.k)
            .field("result_ids", &first.iter().map(|d| d.id.as_str()).collect::<Vec<_>>())
            .field("index_hash", index_hash)
            .seal())
    }
}

#[async_trait]
impl Contract for RetrieverContract {
    type Input = RetrievalProbe;

    fn kind(&self) -> ContractKind {
        ContractKind::Retriever
    }

    async fn verify(&self, input: &RetrievalProbe) -> Result<ContractCertificate, ContractError> {
        self.verify_determinism(
            input.retriever.as_ref(),
            &input.query,
            &input.filters,
            &input.index_hash,
            input.variant.as_ref(),
        )
    }
}
