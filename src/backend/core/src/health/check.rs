//! Probe result and snapshot types.
//!
//! This module provides:
//! - `ProbeStatus`: the three-state outcome of a single probe
//! - `SnapshotStatus`: the derived overall status of an aggregation run
//! - `ProbeResult`: one probe invocation
//! - `ProbeResults`: results in registration order
//! - `HealthSnapshot`: the immutable output of one aggregation run
//!
//! # Status Semantics
//!
//! - **Healthy**: the resource is fully operational
//! - **Warning**: operational with issues (high latency, missing optional config)
//! - **Unhealthy**: not operational
//!
//! # Example
//!
//! ```rust,ignore
//! use preflight_core::health::{ProbeResult, ProbeStatus};
//!
//! let db = ProbeResult::healthy("database")
//!     .with_latency_ms(5)
//!     .with_detail("pool_size", 1);
//! ```

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

use super::probe::Criticality;

// ═══════════════════════════════════════════════════════════════════════════════
// Probe Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Warning,
    Unhealthy,
}

impl ProbeStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Warning or Unhealthy.
    pub fn is_failing(&self) -> bool {
        !self.is_healthy()
    }

    /// Return the worse of two statuses.
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Overall status of a snapshot. Always derived, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl SnapshotStatus {
    /// Healthy or Degraded.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// HTTP status code for the health endpoint.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Healthy | Self::Degraded => 200,
            Self::Unhealthy => 503,
        }
    }

    /// Derive the overall status. Critical failure always dominates.
    pub fn derive<'a>(
        critical_failures: &[String],
        statuses: impl IntoIterator<Item = &'a ProbeStatus>,
    ) -> Self {
        if !critical_failures.is_empty() {
            return Self::Unhealthy;
        }
        if statuses.into_iter().any(|s| s.is_failing()) {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Probe Result
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one probe invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Stable probe identifier
    pub name: String,

    pub status: ProbeStatus,

    /// Measured latency of the check itself
    pub response_time_ms: u64,

    /// Probe-specific diagnostics, never interpreted by the aggregator
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub detail: serde_json::Map<String, serde_json::Value>,

    /// Required whenever status is not Healthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(name: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            name: name.into(),
            status,
            response_time_ms: 0,
            detail: serde_json::Map::new(),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn healthy(name: impl Into<String>) -> Self {
        Self::new(name, ProbeStatus::Healthy)
    }

    pub fn warning(name: impl Into<String>) -> Self {
        Self::new(name, ProbeStatus::Warning)
    }

    pub fn unhealthy(name: impl Into<String>) -> Self {
        Self::new(name, ProbeStatus::Unhealthy)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.response_time_ms = latency.as_millis() as u64;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.response_time_ms = latency_ms;
        self
    }

    /// Add a detail entry. Values that fail to serialize are dropped.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.detail.insert(key.into(), v);
        }
        self
    }

    pub fn with_status(mut self, status: ProbeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Ensure a non-healthy result carries a message.
    pub fn normalized(mut self) -> Self {
        if self.status.is_failing() && self.message.as_deref().map_or(true, str::is_empty) {
            self.message = Some(format!("{} reported {}", self.name, self.status));
        }
        self
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.status)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ordered Results
// ═══════════════════════════════════════════════════════════════════════════════

/// Probe results in registration order.
///
/// Serialized as a JSON object keyed by probe name, emitted in sequence order.
#[derive(Debug, Clone, Default)]
pub struct ProbeResults(Vec<ProbeResult>);

impl ProbeResults {
    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.0.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeResult> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProbeResults {
    type Item = &'a ProbeResult;
    type IntoIter = std::slice::Iter<'a, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ProbeResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in &self.0 {
            map.serialize_entry(&result.name, result)?;
        }
        map.end()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// Process metadata copied into every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub environment: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "preflight".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Summary counts for a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub warning: usize,
    pub unhealthy: usize,
}

/// Immutable result of one aggregation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    status: SnapshotStatus,
    results: ProbeResults,
    critical_failures: Vec<String>,
    summary: HealthSummary,
    uptime_secs: u64,
    service: String,
    version: String,
    environment: String,
    timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Assemble a snapshot from results paired with their criticality, in
    /// registration order.
    pub fn assemble(
        results: Vec<(ProbeResult, Criticality)>,
        info: &ServiceInfo,
        uptime: Duration,
    ) -> Self {
        let critical_failures: Vec<String> = results
            .iter()
            .filter(|(r, c)| *c == Criticality::Critical && r.status == ProbeStatus::Unhealthy)
            .map(|(r, _)| r.name.clone())
            .collect();

        let results: Vec<ProbeResult> = results.into_iter().map(|(r, _)| r).collect();
        let status = SnapshotStatus::derive(&critical_failures, results.iter().map(|r| &r.status));

        let mut summary = HealthSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in &results {
            match result.status {
                ProbeStatus::Healthy => summary.healthy += 1,
                ProbeStatus::Warning => summary.warning += 1,
                ProbeStatus::Unhealthy => summary.unhealthy += 1,
            }
        }

        Self {
            status,
            results: ProbeResults(results),
            critical_failures,
            summary,
            uptime_secs: uptime.as_secs(),
            service: info.service.clone(),
            version: info.version.clone(),
            environment: info.environment.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    pub fn results(&self) -> &ProbeResults {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&ProbeResult> {
        self.results.get(name)
    }

    pub fn critical_failures(&self) -> &[String] {
        &self.critical_failures
    }

    pub fn summary(&self) -> &HealthSummary {
        &self.summary
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime_secs
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn http_status_code(&self) -> u16 {
        self.status.http_status_code()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Liveness
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of the liveness endpoint.
pub const LIVENESS_BODY: &str = "OK";

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
