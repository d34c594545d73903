#![deny(unsafe_code)]
//! # audita-contracts
//!
//! Correctness contracts over the evaluation pipeline.
//!
//! Each contract is a pure verifier over explicit inputs. Verification yields
//! a [`ContractCertificate`]: a canonical, content-hashed JSON record of the
//! inputs digest, the outcome and the contract's own fields, written as
//! `<code>_certificate.json`.
//!
//! ## Key Types
//!
//! - [`Contract`]: The verifier trait
//! - [`ContractKind`]: The contract catalogue and certificate codes
//! - [`CertificateBuilder`]: Accumulates clauses and fields, then seals
//! - [`RefusalContract`] / [`SnapshotContract`]: Prerequisite gates used by the orchestrator
//! - [`ContractError`]: Violations, refusals and invalid inputs

pub mod alignment;
pub mod budget;
pub mod certificate;
pub mod compliance;
pub mod concurrency;
pub mod context;
pub mod contract;
pub mod error;
pub mod fallback;
pub mod idempotency;
pub mod ordering;
pub mod refusal;
pub mod retriever;
pub mod risk;
pub mod routing;
pub mod snapshot;
pub mod traceability;

pub use alignment::{
    AlignmentInput, AlignmentItem, AlignmentParams, AlignmentResult, AlignmentStabilityContract,
};
pub use budget::{BudgetInput, BudgetMonotonicityContract};
pub use certificate::{
    inputs_digest, CertificateBuilder, ContractCertificate, ContractKind, Violation,
};
pub use compliance::{ComplianceInput, ComplianceRules, MonotoneComplianceContract};
pub use concurrency::{results_digest, ConcurrencyDeterminismContract, DeterminismProbe};
pub use context::{ContextImmutabilityContract, ContextProbe, QuestionContext};
pub use contract::Contract;
pub use error::{ContractError, RefusalClause, RefusalError};
pub use fallback::{
    execute_with_fallback, FailureFallbackContract, FallbackInput, FallbackOutcome, ProbeError,
};
pub use idempotency::{DedupStore, IdempotencyContract, IdempotencyInput};
pub use ordering::{stable_sort, stable_sort_by, OrderedScore, OrderingInput, TotalOrderingContract};
pub use refusal::{RefusalContext, RefusalContract, RefusalPolicy};
pub use retriever::{
    retrieval_digest, IndexVariant, IndexedDoc, LexicalRetriever, RetrievalProbe, RetrievedDoc,
    Retriever, RetrieverContract,
};
pub use risk::{synthetic_scores, RiskCertificateContract, RiskInput, RiskReport, DEFAULT_DELTA};
pub use routing::{Route, RouteCandidate, RoutingContract, RoutingInputs, TIE_BREAK_POLICY};
pub use snapshot::SnapshotContract;
pub use traceability::{
    verify_trace, MerkleProof, MerkleTree, Side, TraceInput, TraceabilityContract,
};
