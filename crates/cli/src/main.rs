//! Audita CLI
//!
//! Runs each contract's probe and writes its certificate, or runs the
//! reference pipeline end to end. Exits non-zero when any probe fails or a
//! run does not complete.

use anyhow::Result;
use audita_contracts::ContractKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod output;
mod probes;
mod run;

use config::{CliConfig, ProbeSettings};
use output::{print_certificate, print_error, print_info, print_report, OutputFormat};

#[derive(Parser)]
#[command(name = "audita")]
#[command(about = "Audita - deterministic policy-evaluation contracts", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AUDITA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for certificates and run reports
    #[arg(long, env = "AUDITA_OUT_DIR", global = true)]
    out_dir: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Budget & Monotonicity probe
    Bmc,
    /// Idempotency & Dedup probe
    Idc,
    /// Refusal probe
    Refc,
    /// Total Ordering probe
    Toc,
    /// Traceability (Merkle) probe
    Tc,
    /// Failure & Fallback probe
    Ffc,
    /// Monotone Compliance probe
    Mcc,
    /// Concurrency Determinism probe
    Cdc,
    /// Risk Certificate (split conformal) probe
    Rcc,
    /// Snapshot probe
    Sc,
    /// Retriever determinism probe
    Rec,
    /// Routing probe
    Rc,
    /// Alignment Stability probe
    Asc,
    /// Context Immutability probe
    Cic,
    /// Run every probe
    All,
    /// List contracts and their codes
    List,
    /// Run the reference pipeline
    Run(run::RunArgs),
}

impl Commands {
    fn contracts(&self) -> Vec<ContractKind> {
        let single = match self {
            Self::Bmc => ContractKind::Budget,
            Self::Idc => ContractKind::Idempotency,
            Self::Refc => ContractKind::Refusal,
            Self::Toc => ContractKind::Ordering,
            Self::Tc => ContractKind::Traceability,
            Self::Ffc => ContractKind::Fallback,
            Self::Mcc => ContractKind::Compliance,
            Self::Cdc => ContractKind::Concurrency,
            Self::Rcc => ContractKind::Risk,
            Self::Sc => ContractKind::Snapshot,
            Self::Rec => ContractKind::Retriever,
            Self::Rc => ContractKind::Routing,
            Self::Asc => ContractKind::Alignment,
            Self::Cic => ContractKind::Context,
            Self::All => return ContractKind::ALL.to_vec(),
            Self::List | Self::Run(_) => return Vec::new(),
        };
        vec![single]
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::load(cli.config.as_deref())?;
    let out_dir = cli.out_dir.clone().or_else(|| config.out_dir.clone());
    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let passed = match &cli.command {
        Commands::List => {
            for kind in ContractKind::ALL {
                println!("{:<5} {}", kind.code(), kind.name());
            }
            true
        }
        Commands::Run(args) => {
            let report = run::execute(args, &config).await?;
            if let Some(dir) = &out_dir {
                let path = dir.join(run::REPORT_FILENAME);
                std::fs::write(&path, report.to_json())?;
                print_info(&format!("Report written to {}", path.display()));
            }
            print_report(&report, cli.output);
            report.is_completed()
        }
        command => {
            run_probes(&command.contracts(), &config.probes, out_dir.as_deref(), cli.output).await
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

/// Run each probe in turn; a refusal or invalid input counts as a failure.
async fn run_probes(
    kinds: &[ContractKind],
    settings: &ProbeSettings,
    out_dir: Option<&Path>,
    format: OutputFormat,
) -> bool {
    let mut all_passed = true;
    for &kind in kinds {
        match probes::run_probe(kind, settings).await {
            Ok(cert) => {
                if let Some(dir) = out_dir {
                    if let Err(e) = cert.write_to(dir) {
                        print_error(&format!("{}: {}", kind, e));
                        all_passed = false;
                    }
                }
                all_passed &= cert.pass;
                print_certificate(&cert, format);
            }
            Err(e) => {
                print_error(&format!("{} {}: {}", kind, kind.name(), e));
                all_passed = false;
            }
        }
    }
    all_passed
}
