//! Health Check System
//!
//! Runs every registered probe concurrently, each behind its own timeout and
//! fault boundary, and folds the results into one [`HealthSnapshot`].
//!
//! # Example
//!
//! ```rust,ignore
//! use preflight_core::health::{HealthConfig, HealthService, ProbeRegistry, ServiceInfo};
//!
//! let registry = ProbeRegistry::from_config(&config)?;
//! let service = HealthService::new(registry, config.health.clone(), config.service_info());
//! let snapshot = service.check_health().await;
//! ```

pub mod check;
pub mod probe;
pub mod probes;
pub mod registry;
pub mod routes;

pub use check::{
    HealthSnapshot, HealthSummary, ProbeResult, ProbeResults, ProbeStatus, ServiceInfo,
    SnapshotStatus, LIVENESS_BODY,
};
pub use probe::{run_guarded, Criticality, Probe};
pub use registry::{ProbeRegistry, ProbeRegistryBuilder, RegisteredProbe};
pub use routes::{health_router, health_router_with_readiness, HealthState};

use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{PreflightError, Result};
use crate::retry::RetryPolicy;
use crate::telemetry::{PROBE_DURATION_MS, PROBE_RESULTS_TOTAL, SNAPSHOTS_TOTAL};
use probes::{CpuThresholds, MemoryThresholds};

/// Health check configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Timeout applied to probes without an override
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Directory the filesystem probe writes into
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Process memory ceiling; RLIMIT_AS or total RAM when unset
    #[serde(default)]
    pub process_memory_limit_bytes: Option<u64>,

    #[serde(default)]
    pub memory: MemoryThresholds,

    #[serde(default)]
    pub cpu: CpuThresholds,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            scratch_dir: default_scratch_dir(),
            process_memory_limit_bytes: None,
            memory: MemoryThresholds::default(),
            cpu: CpuThresholds::default(),
        }
    }
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("preflight")
}

/// Health service running the registered probes
pub struct HealthService {
    registry: ProbeRegistry,
    config: HealthConfig,
    info: ServiceInfo,
    started_at: Instant,
}

impl HealthService {
    pub fn new(registry: ProbeRegistry, config: HealthConfig, info: ServiceInfo) -> Self {
        Self {
            registry,
            config,
            info,
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// Get the service uptime.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run all probes concurrently and assemble a snapshot. Never fails.
    pub async fn check_health(&self) -> HealthSnapshot {
        let start = Instant::now();

        let runs = self
            .registry
            .iter()
            .map(|entry| async move { (self.run_entry(entry).await, entry.criticality()) });
        let results = join_all(runs).await;

        let snapshot = HealthSnapshot::assemble(results, &self.info, self.uptime());
        counter!(SNAPSHOTS_TOTAL, "status" => snapshot.status().to_string()).increment(1);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match snapshot.status() {
            SnapshotStatus::Unhealthy => warn!(
                critical_failures = ?snapshot.critical_failures(),
                elapsed_ms,
                "Health check unhealthy"
            ),
            SnapshotStatus::Degraded => info!(
                warning = snapshot.summary().warning,
                unhealthy = snapshot.summary().unhealthy,
                elapsed_ms,
                "Health check degraded"
            ),
            SnapshotStatus::Healthy => debug!(elapsed_ms, "Health check healthy"),
        }

        snapshot
    }

    /// Run a single probe by name, without retries.
    pub async fn probe(&self, name: &str) -> Result<ProbeResult> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| PreflightError::probe_not_found(name))?;
        Ok(self.run_entry(entry).await)
    }

    /// Run a single probe until it reports Healthy or the policy gives up.
    pub async fn retest(&self, name: &str, policy: &RetryPolicy) -> Result<ProbeResult> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| PreflightError::probe_not_found(name))?;

        let operation = format!("retest {}", name);
        let outcome = policy
            .run(&operation, |attempt| async move {
                let result = self.run_entry(entry).await;
                debug!(probe = %entry.name(), attempt, status = %result.status, "Retest attempt");
                if result.status.is_healthy() {
                    Ok(result)
                } else {
                    Err(result)
                }
            })
            .await;

        outcome.map_err(|e| {
            let reason = e
                .last_error
                .message
                .clone()
                .unwrap_or_else(|| e.last_error.status.to_string());
            PreflightError::integration_unreachable(name, e.attempts, reason)
                .with_context("last_result", &e.last_error)
        })
    }

    fn timeout_for(&self, entry: &RegisteredProbe) -> Duration {
        entry.timeout().unwrap_or(self.config.probe_timeout)
    }

    async fn run_entry(&self, entry: &RegisteredProbe) -> ProbeResult {
        let result = run_guarded(
            entry.name(),
            entry.probe().clone(),
            entry.criticality(),
            self.timeout_for(entry),
        )
        .await;
        record_result(&result);
        result
    }
}

fn record_result(result: &ProbeResult) {
    counter!(
        PROBE_RESULTS_TOTAL,
        "probe" => result.name.clone(),
        "status" => result.status.to_string()
    )
    .increment(1);
    histogram!(PROBE_DURATION_MS, "probe" => result.name.clone())
        .record(result.response_time_ms as f64);

    if result.status.is_failing() {
        warn!(
            probe = %result.name,
            status = %result.status,
            response_time_ms = result.response_time_ms,
            message = result.message.as_deref().unwrap_or_default(),
            "Probe not healthy"
        );
    }
}
