//! Probe contract and the fault boundary every probe runs behind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

use super::check::{ProbeResult, ProbeStatus};

/// A bounded diagnostic check against one resource.
///
/// Implementations should convert their own failures into a status. The
/// aggregator still wraps every call in [`run_guarded`], so a probe that
/// panics or hangs cannot take the snapshot down with it.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable identifier, e.g. `database`.
    fn name(&self) -> &str;

    /// Run the check.
    async fn run(&self) -> ProbeResult;
}

/// Whether a probe can fail the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Critical,
    Optional,
}

impl Criticality {
    /// Status reported when the probe faults or times out.
    pub fn fallback_status(&self) -> ProbeStatus {
        match self {
            Self::Critical => ProbeStatus::Unhealthy,
            Self::Optional => ProbeStatus::Warning,
        }
    }

    /// Worst status a probe of this criticality may report.
    pub fn cap(&self, status: ProbeStatus) -> ProbeStatus {
        match self {
            Self::Critical => status,
            Self::Optional => status.min(ProbeStatus::Warning),
        }
    }
}

/// Run `probe` under its timeout and fault boundary.
///
/// The probe executes as its own task. A panic, a timeout or a result carrying
/// the wrong name is converted into a well-formed result; this function never
/// fails.
pub async fn run_guarded(
    name: &str,
    probe: Arc<dyn Probe>,
    criticality: Criticality,
    timeout: Duration,
) -> ProbeResult {
    let start = Instant::now();
    let mut handle = tokio::spawn(async move { probe.run().await });

    let mut result = match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                "panicked"
            } else {
                "was cancelled"
            };
            error!(probe = %name, error = %join_error, "Probe {}", reason);
            ProbeResult::new(name, criticality.fallback_status())
                .with_message(format!("Probe {} before reporting a result", reason))
                .with_latency(start.elapsed())
        }
        Err(_) => {
            handle.abort();
            warn!(probe = %name, timeout_ms = timeout.as_millis() as u64, "Probe timed out");
            ProbeResult::new(name, criticality.fallback_status())
                .with_message(format!("Probe timed out after {}ms", timeout.as_millis()))
                .with_latency(start.elapsed())
        }
    };

    if result.name != name {
        result.name = name.to_string();
    }
    result.status = criticality.cap(result.status);
    result.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(ProbeResult);

    #[async_trait]
    impl Probe for FixedProbe {
        fn name(&self) -> &str {
            &self.0.name
        }

        async fn run(&self) -> ProbeResult {
            self.0.clone()
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn name(&self) -> &str {
            "exploding"
        }

        async fn run(&self) -> ProbeResult {
            panic!("probe blew up")
        }
    }

    struct SleepingProbe;

    #[async_trait]
    impl Probe for SleepingProbe {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn run(&self) -> ProbeResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ProbeResult::healthy("sleepy")
        }
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let probe = Arc::new(FixedProbe(ProbeResult::healthy("cpu").with_latency_ms(3)));
        let result = run_guarded("cpu", probe, Criticality::Critical, Duration::from_secs(1)).await;
        assert_eq!(result.status, ProbeStatus::Healthy);
        assert_eq!(result.response_time_ms, 3);
    }

    #[tokio::test]
    async fn test_panic_maps_to_unhealthy_for_critical() {
        let result = run_guarded(
            "exploding",
            Arc::new(PanickingProbe),
            Criticality::Critical,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result.status, ProbeStatus::Unhealthy);
        assert!(result.message.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_panic_maps_to_warning_for_optional() {
        let result = run_guarded(
            "exploding",
            Arc::new(PanickingProbe),
            Criticality::Optional,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result.status, ProbeStatus::Warning);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_fallback() {
        let result = run_guarded(
            "sleepy",
            Arc::new(SleepingProbe),
            Criticality::Critical,
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result.status, ProbeStatus::Unhealthy);
        assert!(result.message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_optional_probe_is_capped_at_warning() {
        let probe = Arc::new(FixedProbe(
            ProbeResult::unhealthy("github").with_message("HTTP 500"),
        ));
        let result =
            run_guarded("github", probe, Criticality::Optional, Duration::from_secs(1)).await;
        assert_eq!(result.status, ProbeStatus::Warning);
        assert_eq!(result.message.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_result_name_forced_to_registered_name() {
        let probe = Arc::new(FixedProbe(ProbeResult::healthy("something-else")));
        let result =
            run_guarded("database", probe, Criticality::Critical, Duration::from_secs(1)).await;
        assert_eq!(result.name, "database");
    }

    #[tokio::test]
    async fn test_missing_message_is_filled() {
        let probe = Arc::new(FixedProbe(ProbeResult::warning("memory")));
        let result =
            run_guarded("memory", probe, Criticality::Critical, Duration::from_secs(1)).await;
        assert!(result.message.is_some());
    }

    #[test]
    fn test_fallback_status() {
        assert_eq!(Criticality::Critical.fallback_status(), ProbeStatus::Unhealthy);
        assert_eq!(Criticality::Optional.fallback_status(), ProbeStatus::Warning);
    }
}
