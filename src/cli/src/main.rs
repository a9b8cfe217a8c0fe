//! Preflight CLI - deployment readiness from the command line.
//!
//! `validate` runs the checks in-process; `health` and `retest` talk to a
//! running server.

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::{health, retest, validate};
use output::OutputFormat;

/// Exit code for failures of the tool itself, as opposed to a NotReady verdict.
const EXIT_TOOL_ERROR: u8 = 2;

/// Preflight - service health and deployment readiness
#[derive(Parser)]
#[command(
    name = "preflight",
    version,
    about = "Preflight - service health and deployment readiness",
    long_about = "Runs health probes and readiness checks, locally or against a running server.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Server URL for remote commands
    #[arg(long, global = true, env = "PREFLIGHT_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run readiness validation locally; exits 1 when not ready
    Validate(validate::ValidateArgs),

    /// Query a running server's health snapshot
    Health(health::HealthArgs),

    /// Retry an integration probe on a running server
    Retest(retest::RetestArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color || matches!(cli.output, OutputFormat::Json | OutputFormat::Yaml) {
        colored::control::set_override(false);
    }

    let format = cli.output;
    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let result = match cli.command {
        Commands::Validate(args) => validate::execute(args, format).await,
        Commands::Health(args) => match client::ApiClient::new(&api_url) {
            Ok(client) => health::execute(args, &client, format).await,
            Err(e) => Err(e),
        },
        Commands::Retest(args) => match client::ApiClient::new(&api_url) {
            Ok(client) => retest::execute(args, &client, format).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e));
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status for a command outcome.
fn exit_status(result: &anyhow::Result<i32>) -> u8 {
    match result {
        Ok(code) => u8::try_from(*code).unwrap_or(EXIT_TOOL_ERROR),
        Err(_) => EXIT_TOOL_ERROR,
    }
}
