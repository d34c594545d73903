//! Output formatting utilities

use audita_contracts::ContractCertificate;
use audita_orchestrator::RunReport;
use colored::*;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One status line per result
    #[default]
    Text,
    /// Full JSON documents
    Json,
}

pub fn print_certificate(cert: &ContractCertificate, format: OutputFormat) {
    match format {
        OutputFormat::Json => match cert.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&e.to_string()),
        },
        OutputFormat::Text => {
            let label = format!("{} {}", cert.contract, cert.contract.name());
            if cert.pass {
                print_success(&format!("{:<28} {}", label, cert.certificate_hash));
            } else {
                let detail = cert
                    .violation
                    .as_ref()
                    .map(|v| format!("{}: {}", v.clause, v.detail))
                    .unwrap_or_default();
                print_error(&format!("{:<28} {}", label, detail));
            }
        }
    }
}

pub fn print_report(report: &RunReport, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", report.to_json());
        return;
    }
    println!("Run {} ({})", report.run_id, report.policy_unit_id);
    for phase in &report.phases {
        let mark = if phase.is_success() {
            "✓".green()
        } else if phase.skipped {
            "⚠".yellow()
        } else {
            "✗".red()
        };
        println!(
            "  {} {} {:<28} {:>4} tasks {:>6}ms",
            mark, phase.phase, phase.name, phase.tasks_total, phase.duration_ms
        );
    }
    println!("Evidence: {} ({} duplicates)", report.evidence_count, report.duplicate_count);
    println!("State digest: {}", report.state_digest.to_hex());
    match &report.abort_reason {
        None => print_success(&format!("Run {}", report.status)),
        Some(reason) => print_error(&format!("Run {}: {}", report.status, reason)),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
