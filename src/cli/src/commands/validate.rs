//! Readiness validation command.
//!
//! Runs every probe and category check in-process against the local
//! configuration, prints the report and exits non-zero when not deployable.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tabled::Tabled;

use preflight_core::config::Config;
use preflight_core::health::HealthSnapshot;
use preflight_core::readiness::{ReadinessVerdict, Verdict};
use preflight_core::report::{self, AuditRecord};
use preflight_core::{telemetry, Preflight};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Configuration file (defaults to ./preflight.{toml,yaml,json} if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the JSON audit artifact; overrides readiness.audit_dir
    #[arg(long)]
    audit_dir: Option<PathBuf>,

    /// Log probe activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Score")]
    score: u8,
    #[tabled(rename = "Weight")]
    weight: f64,
    #[tabled(rename = "Findings")]
    findings: String,
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Probe")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Time (ms)")]
    response_time_ms: u64,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn execute(args: ValidateArgs, format: OutputFormat) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => {
            let path = path.to_string_lossy();
            Config::from_file(&path).with_context(|| format!("Failed to load {}", path))?
        }
        None => Config::load().context("Failed to load configuration")?,
    };

    config.logging.stderr = true;
    if !args.verbose {
        config.logging.level = "warn".to_string();
    }
    telemetry::init_logging(&config.logging, &config.service.environment)?;

    let audit_dir = args.audit_dir.clone().or_else(|| config.readiness.audit_dir.clone());

    let preflight = Preflight::from_config(config)?;
    let (snapshot, verdict) = preflight.validate().await;

    match format {
        OutputFormat::Table => print_tables(&verdict, &snapshot),
        OutputFormat::Text => print!("{}", report::render_text(&verdict, &snapshot)),
        _ => output::print_item(&AuditRecord::new(&verdict, &snapshot), format)?,
    }

    if let Some(dir) = audit_dir {
        let path = report::write_audit_artifact(&dir, &AuditRecord::new(&verdict, &snapshot))
            .await
            .context("Failed to write audit artifact")?;
        if format == OutputFormat::Table {
            output::print_info(&format!("Audit artifact written to {}", path.display()));
        }
    }

    Ok(report::exit_code(&verdict))
}

fn print_tables(verdict: &ReadinessVerdict, snapshot: &HealthSnapshot) {
    output::print_header("Health");
    output::print_detail("Service", snapshot.service());
    output::print_detail("Environment", snapshot.environment());
    output::print_detail("Status", &output::colorize_status(&snapshot.status().to_string()));
    println!();

    let probes: Vec<ProbeRow> = snapshot
        .results()
        .iter()
        .map(|r| ProbeRow {
            name: r.name.clone(),
            status: output::colorize_status(&r.status.to_string()),
            response_time_ms: r.response_time_ms,
            message: r.message.clone().unwrap_or_default(),
        })
        .collect();
    output::print_table(&probes);

    output::print_header("Readiness");
    let categories: Vec<CategoryRow> = verdict
        .category_scores
        .iter()
        .map(|c| CategoryRow {
            category: c.category.label().to_string(),
            status: output::colorize_status(&c.status.to_string()),
            score: c.numeric_score,
            weight: c.weight,
            findings: c.findings.join("; "),
        })
        .collect();
    output::print_table(&categories);
    println!();

    let summary = format!(
        "Score {}/100: {}",
        verdict.composite_score,
        verdict.verdict.label()
    );
    match verdict.verdict {
        Verdict::Ready => output::print_success(&summary),
        Verdict::ReadyWithWarnings => output::print_warning(&summary),
        Verdict::NotReady => output::print_error(&summary),
    }

    if !verdict.recommendations.is_empty() {
        output::print_header("Recommendations");
        for (i, rec) in verdict.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
    }
}
