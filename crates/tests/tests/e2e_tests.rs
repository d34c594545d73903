#[path = "e2e/full_pipeline.rs"]
mod full_pipeline;

#[path = "e2e/run_gates.rs"]
mod run_gates;

#[path = "e2e/abort_and_timeout.rs"]
mod abort_and_timeout;

#[path = "e2e/contract_certificates.rs"]
mod contract_certificates;
