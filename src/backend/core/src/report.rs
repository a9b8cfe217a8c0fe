//! Boundary adapters for a readiness run: process exit code, plain-text
//! report and the optional JSON audit artifact.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PreflightError, Result};
use crate::health::{HealthSnapshot, ProbeStatus};
use crate::readiness::{CheckOutcome, ReadinessVerdict, Verdict};

/// Exit code for a CLI run: 0 when deployable, 1 otherwise.
pub fn exit_code(verdict: &ReadinessVerdict) -> i32 {
    match verdict.verdict {
        Verdict::Ready | Verdict::ReadyWithWarnings => 0,
        Verdict::NotReady => 1,
    }
}

/// Human-readable report.
pub fn render_text(verdict: &ReadinessVerdict, snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Deployment readiness for {} {} ({})",
        snapshot.service(),
        snapshot.version(),
        snapshot.environment()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Health: {}", snapshot.status());
    for result in snapshot.results() {
        let _ = write!(
            out,
            "  {} {:<14} {:>6}ms",
            status_marker(result.status),
            result.name,
            result.response_time_ms
        );
        if let Some(message) = &result.message {
            let _ = write!(out, "  {}", message);
        }
        let _ = writeln!(out);
    }
    if !snapshot.critical_failures().is_empty() {
        let _ = writeln!(
            out,
            "  critical failures: {}",
            snapshot.critical_failures().join(", ")
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Categories:");
    for score in &verdict.category_scores {
        let _ = writeln!(
            out,
            "  {} {:<18} {:>3}  (weight {})",
            outcome_marker(score.status),
            score.category.label(),
            score.numeric_score,
            score.weight
        );
        for finding in &score.findings {
            let _ = writeln!(out, "      - {}", finding);
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Score: {}/100  Verdict: {}",
        verdict.composite_score,
        verdict.verdict.label()
    );

    if !verdict.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommendations:");
        for (i, rec) in verdict.recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, rec);
        }
    }

    out
}

fn status_marker(status: ProbeStatus) -> &'static str {
    match status {
        ProbeStatus::Healthy => "[ok]  ",
        ProbeStatus::Warning => "[warn]",
        ProbeStatus::Unhealthy => "[fail]",
    }
}

fn outcome_marker(outcome: CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Pass => "[pass]",
        CheckOutcome::Warning => "[warn]",
        CheckOutcome::Fail => "[fail]",
    }
}

/// One readiness run as persisted for history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord<'a> {
    pub recorded_at: DateTime<Utc>,
    pub exit_code: i32,
    pub verdict: &'a ReadinessVerdict,
    pub snapshot: &'a HealthSnapshot,
}

impl<'a> AuditRecord<'a> {
    pub fn new(verdict: &'a ReadinessVerdict, snapshot: &'a HealthSnapshot) -> Self {
        Self {
            recorded_at: Utc::now(),
            exit_code: exit_code(verdict),
            verdict,
            snapshot,
        }
    }

    /// `readiness-<UTC timestamp>.json`
    pub fn file_name(&self) -> String {
        format!(
            "readiness-{}.json",
            self.recorded_at.format("%Y%m%dT%H%M%S%.3fZ")
        )
    }
}

/// Write `record` as pretty JSON into `dir`, creating it if needed.
pub async fn write_audit_artifact(dir: &Path, record: &AuditRecord<'_>) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        PreflightError::from(e)
            .with_internal_message(format!("creating audit dir {}", dir.display()))
    })?;

    let path = dir.join(record.file_name());
    let body = serde_json::to_vec_pretty(record)?;
    tokio::fs::write(&path, body).await?;

    info!(path = %path.display(), verdict = %record.verdict.verdict, "Audit artifact written");
    Ok(path)
}
