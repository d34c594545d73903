use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based phase number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(pub u8);

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{:02}", self.0)
    }
}

/// Static description of one pipeline phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub id: PhaseId,
    pub name: String,
    /// Runs inline: no pool and no timer.
    pub synchronous: bool,
    /// A failure is recorded and the run continues.
    pub skippable: bool,
    /// The run's snapshot must be complete before the phase starts.
    pub requires_snapshot: bool,
    /// The refusal clauses must hold before the run leaves this phase.
    pub requires_prerequisites: bool,
    /// Compare planned question and method counts against the expected ones.
    pub validates_cardinality: bool,
    /// Recommended budget; a configured override takes precedence.
    pub timeout_ms: Option<u64>,
}

impl PhaseSpec {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            id: PhaseId(id),
            name: name.into(),
            synchronous: false,
            skippable: false,
            requires_snapshot: false,
            requires_prerequisites: false,
            validates_cardinality: false,
            timeout_ms: None,
        }
    }

    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    pub fn requires_snapshot(mut self) -> Self {
        self.requires_snapshot = true;
        self
    }

    pub fn with_prerequisites(mut self) -> Self {
        self.requires_prerequisites = true;
        self
    }

    pub fn validates_cardinality(mut self) -> Self {
        self.validates_cardinality = true;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// The eleven-phase evaluation pipeline.
pub fn default_catalogue() -> Vec<PhaseSpec> {
    vec![
        PhaseSpec::new(1, "configuration validation")
            .synchronous()
            .with_prerequisites()
            .validates_cardinality(),
        PhaseSpec::new(2, "document ingestion").synchronous(),
        // Hundreds of questions; outlasts the uniform default.
        PhaseSpec::new(3, "micro questions")
            .requires_snapshot()
            .with_timeout_ms(600_000),
        PhaseSpec::new(4, "micro scoring"),
        PhaseSpec::new(5, "dimension aggregation"),
        PhaseSpec::new(6, "policy area aggregation"),
        PhaseSpec::new(7, "cluster aggregation").synchronous(),
        PhaseSpec::new(8, "macro evaluation").synchronous(),
        PhaseSpec::new(9, "recommendations").skippable(),
        PhaseSpec::new(10, "report assembly").synchronous(),
        PhaseSpec::new(11, "formatting and export"),
    ]
}

/// Ids must be non-empty, start anywhere and strictly increase.
pub(crate) fn validate_catalogue(phases: &[PhaseSpec]) -> Result<(), String> {
    if phases.is_empty() {
        return Err("no phases".into());
    }
    for pair in phases.windows(2) {
        if pair[1].id <= pair[0].id {
            return Err(format!(
                "phase {} follows {}; ids must strictly increase",
                pair[1].id, pair[0].id
            ));
        }
    }
    Ok(())
}
