#![deny(unsafe_code)]
//! # audita-evidence
//!
//! Content-addressed evidence registry.
//!
//! Every successful task emits an [`Evidence`](audita_types::Evidence) that is
//! stored once under its content hash, together with a [`ProvenanceNode`]
//! linking it to the method and inputs that produced it. The provenance graph
//! is kept acyclic, and any recorded step can be replayed and checked.
//!
//! ## Key Types
//!
//! - [`EvidenceRegistry`]: Append-only registry with duplicate counting
//! - [`ProvenanceDag`]: Acyclic input-to-output graph
//! - [`EvidenceStore`]: Pluggable storage ([`InMemoryEvidenceStore`] provided)

pub mod error;
pub mod provenance;
pub mod registry;
pub mod store;

pub use error::{CycleError, RegistryError, StoreError};
pub use provenance::{ProvenanceDag, ProvenanceNode};
pub use registry::EvidenceRegistry;
pub use store::{EvidenceStore, InMemoryEvidenceStore};
