//! CLI configuration file (TOML).

use anyhow::{Context, Result};
use audita_orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs for the canned contract probes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Miscoverage level for the risk probe and the refusal context.
    pub alpha: f64,
    pub seed: u64,
    /// Parallel worker count compared against one worker.
    pub workers: usize,
    /// Calibration and holdout sample size for the risk probe.
    pub samples: usize,
    pub retrieval_k: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            seed: 42,
            workers: 4,
            samples: 1000,
            retrieval_k: 5,
        }
    }
}

/// Loaded from `--config`, then overlaid with the environment.
///
/// ```toml
/// out_dir = "certificates"
///
/// [probes]
/// alpha = 0.1
/// seed = 42
///
/// [orchestrator]
/// default_phase_timeout_ms = 300000
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub out_dir: Option<PathBuf>,
    pub probes: ProbeSettings,
    pub orchestrator: OrchestratorConfig,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.orchestrator = config
            .orchestrator
            .apply_env(|key| std::env::var(key).ok())?;
        config.orchestrator.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
