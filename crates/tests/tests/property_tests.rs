#[path = "property/determinism.rs"]
mod determinism;

#[path = "property/contract_laws.rs"]
mod contract_laws;

#[path = "property/provenance.rs"]
mod provenance;
