use crate::error::ConfigError;
use crate::phase::{PhaseId, PhaseSpec};
use audita_contracts::RefusalPolicy;
use audita_pool::{BackoffPolicy, PoolConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PHASE_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_QUESTION_COUNT: usize = 305;
pub const DEFAULT_METHOD_COUNT: usize = 416;

pub const ENV_EXPECTED_QUESTION_COUNT: &str = "EXPECTED_QUESTION_COUNT";
pub const ENV_EXPECTED_METHOD_COUNT: &str = "EXPECTED_METHOD_COUNT";
pub const ENV_PHASE_TIMEOUT_SECONDS: &str = "PHASE_TIMEOUT_SECONDS";
pub const ENV_MAX_WORKERS: &str = "AUDITA_MAX_WORKERS";

/// Bounds applied to every phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// A pooled phase fails when `failed / total` exceeds this.
    pub max_failed_ratio: f64,
    pub expected_question_count: Option<usize>,
    pub expected_method_count: Option<usize>,
    /// Cardinality mismatches fail the phase instead of only warning.
    pub strict_cardinality: bool,
    /// Capture a resource snapshot every N processed items.
    pub snapshot_interval: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_failed_ratio: 0.5,
            expected_question_count: Some(DEFAULT_QUESTION_COUNT),
            expected_method_count: Some(DEFAULT_METHOD_COUNT),
            strict_cardinality: false,
            snapshot_interval: 10,
        }
    }
}

/// Per-phase timeout override.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimeout {
    pub phase: u8,
    pub timeout_ms: u64,
}

/// Orchestrator configuration.
///
/// Timeout resolution for a phase: `phase_timeouts` override, then the
/// phase's own budget, then `default_phase_timeout_ms`. In the default
/// catalogue only micro questions carry a budget of their own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub default_phase_timeout_ms: u64,
    pub phase_timeouts: Vec<PhaseTimeout>,
    /// Replaces the catalogue's synchronous flags when set.
    pub sync_phases: Option<BTreeSet<u8>>,
    pub pool: PoolConfig,
    pub limits: ResourceLimits,
    pub refusal: RefusalPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_phase_timeout_ms: DEFAULT_PHASE_TIMEOUT_MS,
            phase_timeouts: Vec::new(),
            sync_phases: None,
            pool: PoolConfig::default(),
            limits: ResourceLimits::default(),
            refusal: RefusalPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// No tolerated task failures, no retries, cardinality enforced.
    pub fn strict() -> Self {
        Self {
            pool: PoolConfig::default().with_retries(0, BackoffPolicy::None),
            limits: ResourceLimits {
                max_failed_ratio: 0.0,
                strict_cardinality: true,
                ..ResourceLimits::default()
            },
            ..Self::default()
        }
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment-style lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_EXPECTED_QUESTION_COUNT) {
            self.limits.expected_question_count = Some(parse_count(ENV_EXPECTED_QUESTION_COUNT, &v)?);
        }
        if let Some(v) = lookup(ENV_EXPECTED_METHOD_COUNT) {
            self.limits.expected_method_count = Some(parse_count(ENV_EXPECTED_METHOD_COUNT, &v)?);
        }
        if let Some(v) = lookup(ENV_PHASE_TIMEOUT_SECONDS) {
            let secs = parse_positive(ENV_PHASE_TIMEOUT_SECONDS, &v)?;
            self.default_phase_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(v) = lookup(ENV_MAX_WORKERS) {
            self.pool.max_workers = parse_positive(ENV_MAX_WORKERS, &v)? as usize;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_phase_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "default_phase_timeout_ms",
                0,
                "must be positive",
            ));
        }
        if let Some(t) = self.phase_timeouts.iter().find(|t| t.timeout_ms == 0) {
            return Err(ConfigError::invalid(
                "phase_timeouts",
                t.phase,
                "timeout must be positive",
            ));
        }
        let ratio = self.limits.max_failed_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::invalid(
                "limits.max_failed_ratio",
                ratio,
                "must be within [0, 1]",
            ));
        }
        if self.pool.max_workers == 0 {
            return Err(ConfigError::invalid("pool.max_workers", 0, "must be positive"));
        }
        Ok(())
    }

    pub fn with_phase_timeout(mut self, phase: u8, timeout: Duration) -> Self {
        self.phase_timeouts.retain(|t| t.phase != phase);
        self.phase_timeouts.push(PhaseTimeout {
            phase,
            timeout_ms: timeout.as_millis() as u64,
        });
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn timeout_for(&self, spec: &PhaseSpec) -> Duration {
        let ms = self
            .phase_timeouts
            .iter()
            .find(|t| PhaseId(t.phase) == spec.id)
            .map(|t| t.timeout_ms)
            .or(spec.timeout_ms)
            .unwrap_or(self.default_phase_timeout_ms);
        Duration::from_millis(ms)
    }

    pub fn is_synchronous(&self, spec: &PhaseSpec) -> bool {
        match &self.sync_phases {
            Some(set) => set.contains(&spec.id.0),
            None => spec.synchronous,
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::invalid(key, value, "expected a non-negative integer"))
}

fn parse_positive(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::invalid(key, value, "expected a positive integer")),
    }
}
