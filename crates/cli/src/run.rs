//! `audita run`: the reference pipeline over a document.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use audita_orchestrator::{
    Document, Orchestrator, RunContext, RunReport, SimulatedExecutor, StaticPlan,
};
use audita_types::Sigma;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const REPORT_FILENAME: &str = "run_report.json";

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Document to evaluate (a built-in sample when omitted)
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Number of micro questions in the reference plan
    #[arg(short, long, default_value_t = 12)]
    pub questions: usize,

    /// Override the pool's worker count
    #[arg(short, long)]
    pub workers: Option<usize>,

    #[arg(long, default_value = "PU-DEMO")]
    pub policy_unit: String,

    #[arg(long, default_value = "demo")]
    pub correlation: String,

    #[arg(long, default_value_t = 0.1)]
    pub alpha: f64,

    /// Run without an environment snapshot (the run is refused)
    #[arg(long)]
    pub no_sigma: bool,

    /// Make a method fail, e.g. `--fail recommend.generate`
    #[arg(long = "fail", value_name = "METHOD")]
    pub failing: Vec<String>,

    /// Simulated per-invocation latency
    #[arg(long, value_name = "MS")]
    pub latency_ms: Option<u64>,
}

const SAMPLE_DOCUMENT: &str = "Plan de desarrollo municipal 2024-2027. \
Diagnóstico: cobertura de agua potable del 72% en zona rural. \
Meta: 90% de cobertura al 2027 con presupuesto asignado de 4.500 millones.";

pub async fn execute(args: &RunArgs, config: &CliConfig) -> Result<RunReport> {
    let document = match &args.document {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading document {}", path.display()))?;
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".into());
            Document::new(id, text)
        }
        None => Document::new("sample-plan", SAMPLE_DOCUMENT),
    };

    let mut orch_config = config.orchestrator.clone();
    if let Some(workers) = args.workers {
        orch_config.pool = orch_config.pool.with_workers(workers);
    }

    let mut executor = SimulatedExecutor::new();
    for method in &args.failing {
        executor = executor.failing(method.clone());
    }
    if let Some(ms) = args.latency_ms {
        executor = executor.with_latency(Duration::from_millis(ms));
    }

    let orchestrator = Orchestrator::new(
        orch_config,
        Arc::new(StaticPlan::reference(args.questions)),
        Arc::new(executor),
    )?;

    let mut ctx = RunContext::new(args.policy_unit.as_str(), args.correlation.as_str())
        .with_alpha(args.alpha);
    if !args.no_sigma {
        ctx = ctx.with_sigma(Sigma::new(
            "standards-2024.1",
            "corpus-2024.1",
            "index-2024.1",
        ));
    }

    Ok(orchestrator.run(&document, &ctx).await?)
}
