//! Integration retest command.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RetestArgs {
    /// Probe name, e.g. github
    name: String,
}

pub async fn execute(args: RetestArgs, client: &ApiClient, format: OutputFormat) -> Result<i32> {
    let path = format!("/health/integrations/{}/retest", args.name);
    let reply = client.post_json(&path).await?;

    if !matches!(format, OutputFormat::Table | OutputFormat::Text) {
        output::print_item(&reply.body, format)?;
        return Ok(if reply.status.is_success() { 0 } else { 1 });
    }

    if reply.status.is_success() {
        let took = reply
            .body
            .get("responseTimeMs")
            .and_then(|v| v.as_u64())
            .unwrap_or_default();
        output::print_success(&format!("{} is reachable ({}ms)", args.name, took));
        Ok(0)
    } else {
        let message = reply
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("retest returned {}", reply.status));
        output::print_error(&message);
        Ok(1)
    }
}
