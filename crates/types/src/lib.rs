#![deny(unsafe_code)]
//! # audita-types
//!
//! Leaf primitives shared by every Audita crate.
//!
//! ## Key Types
//!
//! - [`ContentHash`]: BLAKE3 content-addressed identifier
//! - [`Evidence`]: Immutable, content-hashed artifact of a method execution
//! - [`Sigma`]: Environment snapshot (standards, corpus, index hashes)
//! - [`ExecutionStatus`]: SUCCESS / FAILED / ABORTED / TIMED_OUT
//! - [`Label`]: Compliance label, `UNSAT < PARTIAL < SAT`
//!
//! All hashing goes through [`canonical`], which sorts object keys so that
//! construction order never leaks into identity.

pub mod canonical;
pub mod evidence;
pub mod hash;
pub mod label;
pub mod sigma;
pub mod status;

pub use canonical::{
    canonical_bytes, canonical_pretty, canonical_string, canonical_value, canonicalize,
    content_hash, CanonicalError,
};
pub use evidence::{Evidence, EvidenceError};
pub use hash::{ContentHash, ContentHashError};
pub use label::Label;
pub use sigma::{Sigma, SigmaKey};
pub use status::ExecutionStatus;
