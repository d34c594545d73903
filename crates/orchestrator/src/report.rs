use crate::instrumentation::InstrumentationReport;
use crate::phase::{PhaseId, PhaseSpec};
use audita_contracts::RefusalError;
use audita_pool::PoolMetrics;
use audita_types::{canonical_pretty, ContentHash, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running { phase: PhaseId },
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running { phase } => write!(f, "RUNNING({})", phase),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a run stopped early.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    #[error("{phase} aborted: {reason}")]
    Requested { phase: PhaseId, reason: String },

    #[error("{phase} exceeded its timeout of {timeout_ms}ms")]
    PhaseTimeout { phase: PhaseId, timeout_ms: u64 },

    #[error("{phase} refused: {error}")]
    Refusal { phase: PhaseId, error: RefusalError },

    #[error("{phase} snapshot gate: {error}")]
    Snapshot { phase: PhaseId, error: RefusalError },

    #[error("{phase} provenance cycle: {detail}")]
    Cycle { phase: PhaseId, detail: String },

    #[error("{phase} failed-task ratio {ratio:.3} exceeds {limit:.3}")]
    FailureThreshold {
        phase: PhaseId,
        ratio: f64,
        limit: f64,
    },

    #[error("{phase} expected {expected} {item}, planned {actual}")]
    Cardinality {
        phase: PhaseId,
        item: String,
        expected: usize,
        actual: usize,
    },

    #[error("{phase} evidence registry error: {detail}")]
    Registry { phase: PhaseId, detail: String },
}

impl AbortReason {
    pub fn phase(&self) -> PhaseId {
        match self {
            Self::Requested { phase, .. }
            | Self::PhaseTimeout { phase, .. }
            | Self::Refusal { phase, .. }
            | Self::Snapshot { phase, .. }
            | Self::Cycle { phase, .. }
            | Self::FailureThreshold { phase, .. }
            | Self::Cardinality { phase, .. }
            | Self::Registry { phase, .. } => *phase,
        }
    }

    /// Interruptions end a run ABORTED; everything else ends it FAILED.
    pub fn run_status(&self) -> RunStatus {
        match self {
            Self::Requested { .. } | Self::PhaseTimeout { .. } => RunStatus::Aborted,
            _ => RunStatus::Failed,
        }
    }
}

/// Outcome of one phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: PhaseId,
    pub name: String,
    pub status: ExecutionStatus,
    pub synchronous: bool,
    /// A skippable phase failed and the run continued.
    pub skipped: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tasks_total: usize,
    pub tasks_failed: usize,
    /// Evidence recorded by this phase, in submission order.
    pub evidence: Vec<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolMetrics>,
    pub instrumentation: InstrumentationReport,
}

impl PhaseResult {
    pub(crate) fn new(
        spec: &PhaseSpec,
        synchronous: bool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        instrumentation: InstrumentationReport,
    ) -> Self {
        Self {
            phase: spec.id,
            name: spec.name.clone(),
            status: ExecutionStatus::Success,
            synchronous,
            skipped: false,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            tasks_total: 0,
            tasks_failed: 0,
            evidence: Vec::new(),
            error: None,
            metadata: BTreeMap::new(),
            pool: None,
            instrumentation,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Archived record of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub policy_unit_id: String,
    pub correlation_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    pub phases: Vec<PhaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_digest: Option<ContentHash>,
    pub root_evidence: ContentHash,
    pub evidence_count: usize,
    pub duplicate_count: u64,
    /// Order-insensitive digest over every recorded evidence hash.
    pub state_digest: ContentHash,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn phase(&self, id: PhaseId) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == id)
    }

    /// Pretty key-sorted JSON.
    pub fn to_json(&self) -> String {
        canonical_pretty(self).expect("serializable")
    }
}
