//! Health check command.
//!
//! Queries a running server's `/health` endpoint and displays probe status.

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Only check that the process is up
    #[arg(long)]
    live: bool,
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

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<i32> {
    if args.live {
        return live(client).await;
    }

    let reply = client.get_json("/health").await?;
    let health = &reply.body;
    let status = health
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    match format {
        OutputFormat::Table | OutputFormat::Text => {
            output::print_header("Service Health");
            output::print_detail("Status", &output::colorize_status(status));
            output::print_detail("API URL", client.base_url());

            for key in ["service", "version", "environment", "timestamp"] {
                if let Some(value) = health.get(key).and_then(|v| v.as_str()) {
                    output::print_detail(key, value);
                }
            }
            println!();

            let rows = probe_rows(health);
            output::print_table(&rows);

            match status {
                "healthy" => output::print_success("All probes healthy"),
                "degraded" => output::print_warning("Service degraded"),
                _ => output::print_error(&format!("Service status: {}", status)),
            }
        }
        _ => output::print_item(health, format)?,
    }

    Ok(if reply.status.is_success() { 0 } else { 1 })
}

/// One row per probe, in the order the server reported them.
fn probe_rows(health: &Value) -> Vec<ProbeRow> {
    let Some(results) = health.get("results").and_then(|v| v.as_object()) else {
        return Vec::new();
    };
    results
        .iter()
        .map(|(name, result)| ProbeRow {
            name: name.clone(),
            status: output::colorize_status(
                result.get("status").and_then(|v| v.as_str()).unwrap_or("?"),
            ),
            response_time_ms: result
                .get("responseTimeMs")
                .and_then(|v| v.as_u64())
                .unwrap_or_default(),
            message: result
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

async fn live(client: &ApiClient) -> Result<i32> {
    match client.get_status("/health/live").await {
        Ok(status) if status.is_success() => {
            output::print_success(&format!("{} is live", client.base_url()));
            Ok(0)
        }
        Ok(status) => {
            output::print_error(&format!("Liveness returned {}", status));
            Ok(1)
        }
        Err(e) => {
            output::print_error(&format!("Liveness check failed: {:#}", e));
            Ok(1)
        }
    }
}
