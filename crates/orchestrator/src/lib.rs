#![deny(unsafe_code)]
//! # audita-orchestrator
//!
//! Runs a policy document through the eleven-phase evaluation catalogue.
//!
//! Phases execute strictly in order. Synchronous phases run inline; the rest
//! fan out over the deterministic worker pool under a per-phase timeout.
//! Every produced evidence record lands in the provenance registry linked to
//! the previous phase's output, so the whole run replays to one state digest.
//!
//! Gates:
//! - the environment snapshot is verified before micro-question answering
//! - refusal prerequisites are verified when the configuration phase exits
//! - question and method cardinality is checked during configuration
//!
//! ## Key Types
//!
//! - [`Orchestrator`]: Sequences phases, owns the registry and abort signal
//! - [`OrchestratorConfig`]: Timeouts, pool sizing, limits, refusal policy
//! - [`PhaseSpec`]: One entry of the phase catalogue
//! - [`PhasePlanner`]: Decides which method invocations a phase runs
//! - [`MethodExecutor`]: Runs one analytical method and returns evidence
//! - [`RunContext`]: Per-run identity, snapshot, calibration and seeds
//! - [`RunReport`]: Archived outcome with per-phase instrumentation

pub mod calibration;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod instrumentation;
pub mod orchestrator;
pub mod phase;
pub mod planner;
pub mod report;
pub mod seed;

pub use calibration::{CalibrationRegistry, ParameterBundle, DEFAULT_BUNDLE_VERSION};
pub use config::{OrchestratorConfig, PhaseTimeout, ResourceLimits};
pub use context::RunContext;
pub use error::{ConfigError, ExecutorError, OrchestratorError};
pub use executor::{
    Document, MethodContext, MethodExecutor, MethodInvocation, SimulatedExecutor,
    DOCUMENT_ROOT_METHOD,
};
pub use instrumentation::{
    InstrumentEntry, InstrumentationReport, LatencyAnomaly, LatencySummary, PhaseInstrumentation,
    ResourceSnapshot,
};
pub use orchestrator::Orchestrator;
pub use phase::{default_catalogue, PhaseId, PhaseSpec};
pub use planner::{PhasePlanner, StaticPlan};
pub use report::{AbortReason, PhaseResult, RunReport, RunStatus};
pub use seed::{SeedRecord, SeedRegistry};
