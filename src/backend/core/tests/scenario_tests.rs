//! End-to-end aggregation and readiness scenarios.

use async_trait::async_trait;
use std::time::Duration;

use preflight_core::error::Result;
use preflight_core::health::{
    HealthConfig, HealthService, HealthSnapshot, Probe, ProbeRegistry, ProbeResult, ProbeStatus,
    ServiceInfo, SnapshotStatus,
};
use preflight_core::readiness::{
    Category, CategoryResult, CategoryValidator, CategoryWeights, CheckOutcome, DatabaseValidator,
    HealthValidator, ReadinessBands, ReadinessEvaluator, Verdict,
};

// ============================================================================
// Test Helpers
// ============================================================================

struct Fixed(ProbeResult);

#[async_trait]
impl Probe for Fixed {
    fn name(&self) -> &str {
        &self.0.name
    }

    async fn run(&self) -> ProbeResult {
        self.0.clone()
    }
}

struct Panicking(&'static str);

#[async_trait]
impl Probe for Panicking {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self) -> ProbeResult {
        panic!("probe {} blew up", self.0)
    }
}

/// Validator that reports a fixed outcome.
struct Scripted(Category, CheckOutcome);

impl CategoryValidator for Scripted {
    fn category(&self) -> Category {
        self.0
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        Ok(CategoryResult::new(self.0, self.1))
    }
}

fn service(registry: ProbeRegistry) -> HealthService {
    let config = HealthConfig {
        probe_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    HealthService::new(registry, config, ServiceInfo::default())
}

fn all_healthy() -> ProbeRegistry {
    ProbeRegistry::builder()
        .critical(Fixed(ProbeResult::healthy("database").with_latency_ms(5)))
        .critical(Fixed(ProbeResult::healthy("filesystem")))
        .critical(Fixed(ProbeResult::healthy("memory")))
        .critical(Fixed(ProbeResult::healthy("cpu")))
        .optional(Fixed(ProbeResult::healthy("github")))
        .build()
        .unwrap()
}

fn scripted(outcomes: &[(Category, CheckOutcome)]) -> ReadinessEvaluator {
    outcomes.iter().fold(
        ReadinessEvaluator::new(CategoryWeights::default(), ReadinessBands::default()),
        |evaluator, (category, outcome)| evaluator.with_validator(Scripted(*category, *outcome)),
    )
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_all_healthy_scores_100() {
    let snapshot = service(all_healthy()).check_health().await;
    assert_eq!(snapshot.status(), SnapshotStatus::Healthy);

    let passing: Vec<(Category, CheckOutcome)> = Category::ALL
        .iter()
        .filter(|c| !matches!(c, Category::Health | Category::Database))
        .map(|c| (*c, CheckOutcome::Pass))
        .collect();
    let evaluator = scripted(&passing)
        .with_validator(HealthValidator)
        .with_validator(DatabaseValidator::new(true));
    let verdict = evaluator.evaluate(&snapshot);

    assert_eq!(verdict.composite_score, 100);
    assert_eq!(verdict.verdict, Verdict::Ready);
    assert!(verdict.recommendations.is_empty());
}

#[tokio::test]
async fn test_critical_failure_dominates() {
    let registry = ProbeRegistry::builder()
        .critical(Fixed(
            ProbeResult::unhealthy("database").with_message("connection refused"),
        ))
        .critical(Fixed(ProbeResult::healthy("filesystem")))
        .critical(Fixed(ProbeResult::healthy("memory")))
        .critical(Fixed(ProbeResult::healthy("cpu")))
        .optional(Fixed(ProbeResult::healthy("github")))
        .build()
        .unwrap();

    let snapshot = service(registry).check_health().await;
    assert_eq!(snapshot.status(), SnapshotStatus::Unhealthy);
    assert_eq!(snapshot.critical_failures(), &["database".to_string()]);
    assert_eq!(snapshot.http_status_code(), 503);
    assert_eq!(snapshot.summary().healthy, 4);
}

#[tokio::test]
async fn test_optional_failure_only_degrades() {
    let registry = ProbeRegistry::builder()
        .critical(Fixed(ProbeResult::healthy("database")))
        .optional(Fixed(
            ProbeResult::unhealthy("payments").with_message("HTTP 500"),
        ))
        .build()
        .unwrap();

    let snapshot = service(registry).check_health().await;
    assert_eq!(snapshot.status(), SnapshotStatus::Degraded);
    assert!(snapshot.critical_failures().is_empty());
    // optional probes never report worse than warning
    assert_eq!(
        snapshot.result("payments").unwrap().status,
        ProbeStatus::Warning
    );
}

#[tokio::test]
async fn test_panicking_probes_are_contained() {
    let registry = ProbeRegistry::builder()
        .critical(Panicking("database"))
        .optional(Panicking("github"))
        .critical(Fixed(ProbeResult::healthy("cpu")))
        .build()
        .unwrap();

    let snapshot = service(registry).check_health().await;
    assert_eq!(snapshot.status(), SnapshotStatus::Unhealthy);

    let database = snapshot.result("database").unwrap();
    assert_eq!(database.status, ProbeStatus::Unhealthy);
    assert!(database.message.is_some());
    assert_eq!(
        snapshot.result("github").unwrap().status,
        ProbeStatus::Warning
    );

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["results"]["database"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_snapshot_json_shape() {
    let snapshot = service(all_healthy()).check_health().await;
    let json = serde_json::to_value(&snapshot).unwrap();

    // serde_json::Value sorts keys, so check order on the raw text
    let text = serde_json::to_string(&snapshot).unwrap();
    let positions: Vec<usize> = ["database", "filesystem", "memory", "cpu", "github"]
        .iter()
        .map(|name| text.find(&format!("\"{}\":{{", name)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(json["results"]["database"]["responseTimeMs"], 5);
    assert_eq!(json["criticalFailures"], serde_json::json!([]));
    assert_eq!(json["summary"]["total"], 5);
}

// ============================================================================
// Readiness
// ============================================================================

#[tokio::test]
async fn test_weighted_scenario() {
    let snapshot = service(all_healthy()).check_health().await;
    let evaluator = scripted(&[
        (Category::Environment, CheckOutcome::Pass),
        (Category::Database, CheckOutcome::Pass),
        (Category::Security, CheckOutcome::Warning),
        (Category::Application, CheckOutcome::Pass),
        (Category::Health, CheckOutcome::Pass),
        (Category::Performance, CheckOutcome::Warning),
        (Category::Packaging, CheckOutcome::Pass),
        (Category::SecurityHeaders, CheckOutcome::Pass),
        (Category::RateLimiting, CheckOutcome::Pass),
    ]);

    let verdict = evaluator.evaluate(&snapshot);
    // 9250 / 100
    assert!((verdict.exact_score - 92.5).abs() < 1e-9);
    assert_eq!(verdict.composite_score, 93);
    assert_eq!(verdict.verdict, Verdict::Ready);
    assert_eq!(
        verdict.recommendations,
        vec![
            Category::Security.remediation().to_string(),
            Category::Performance.remediation().to_string(),
        ]
    );
}

#[tokio::test]
async fn test_missing_categories_count_as_fail() {
    let snapshot = service(all_healthy()).check_health().await;
    let evaluator = scripted(&[
        (Category::Environment, CheckOutcome::Pass),
        (Category::Database, CheckOutcome::Pass),
        (Category::Security, CheckOutcome::Pass),
    ]);

    let verdict = evaluator.evaluate(&snapshot);
    assert_eq!(verdict.composite_score, 55);
    assert_eq!(verdict.verdict, Verdict::NotReady);
    assert_eq!(verdict.category_scores.len(), Category::ALL.len());
}

#[tokio::test]
async fn test_degraded_health_lowers_score() {
    let registry = ProbeRegistry::builder()
        .critical(Fixed(ProbeResult::healthy("database")))
        .optional(Fixed(ProbeResult::warning("github").with_message("no token")))
        .build()
        .unwrap();
    let snapshot = service(registry).check_health().await;

    let others: Vec<(Category, CheckOutcome)> = Category::ALL
        .iter()
        .filter(|c| **c != Category::Health)
        .map(|c| (*c, CheckOutcome::Pass))
        .collect();
    let verdict = scripted(&others)
        .with_validator(HealthValidator)
        .evaluate(&snapshot);

    assert_eq!(verdict.composite_score, 97);
    let health = verdict.category(Category::Health).unwrap();
    assert_eq!(health.status, CheckOutcome::Warning);
    assert!(health.findings[0].contains("no token"));
}
