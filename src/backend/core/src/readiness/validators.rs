//! Category validators.
//!
//! Each validator inspects one concern and reports a [`CategoryResult`].
//! Validators may read the health snapshot but never run probes themselves.

use std::path::PathBuf;
use std::sync::Arc;

use super::{Category, CategoryResult, CheckOutcome};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::health::{HealthSnapshot, ProbeStatus, SnapshotStatus};
use crate::middleware::{RateLimitConfig, SecurityHeadersConfig};

/// Checks one readiness category.
pub trait CategoryValidator: Send + Sync {
    fn category(&self) -> Category;

    fn validate(&self, snapshot: &HealthSnapshot) -> Result<CategoryResult>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════════════════════════

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Required variables fail when missing; recommended ones warn.
pub struct EnvironmentValidator {
    required: Vec<String>,
    recommended: Vec<String>,
    lookup: EnvLookup,
}

impl EnvironmentValidator {
    pub fn new(
        required: Vec<String>,
        recommended: Vec<String>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            required,
            recommended,
            lookup: Arc::new(lookup),
        }
    }

    pub fn from_process_env(required: Vec<String>, recommended: Vec<String>) -> Self {
        Self::new(required, recommended, |key| std::env::var(key).ok())
    }

    fn is_set(&self, key: &str) -> bool {
        (self.lookup)(key).is_some_and(|v| !v.trim().is_empty())
    }
}

impl CategoryValidator for EnvironmentValidator {
    fn category(&self) -> Category {
        Category::Environment
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let mut result = CategoryResult::pass(self.category());
        for key in self.required.iter().filter(|k| !self.is_set(k)) {
            result.record(CheckOutcome::Fail, format!("Required variable {} is not set", key));
        }
        for key in self.recommended.iter().filter(|k| !self.is_set(k)) {
            result.record(
                CheckOutcome::Warning,
                format!("Recommended variable {} is not set", key),
            );
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Database
// ═══════════════════════════════════════════════════════════════════════════════

/// Database configured and its probe passing.
pub struct DatabaseValidator {
    configured: bool,
}

impl DatabaseValidator {
    pub fn new(configured: bool) -> Self {
        Self { configured }
    }
}

impl CategoryValidator for DatabaseValidator {
    fn category(&self) -> Category {
        Category::Database
    }

    fn validate(&self, snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        if !self.configured {
            return Ok(CategoryResult::fail(
                self.category(),
                "No database URL is configured",
            ));
        }
        let Some(probe) = snapshot.result("database") else {
            return Ok(CategoryResult::warning(
                self.category(),
                "Database probe is not registered",
            ));
        };
        let outcome = CheckOutcome::from(probe.status);
        let mut result = CategoryResult::new(self.category(), outcome);
        if let Some(message) = probe.message.as_ref().filter(|_| outcome != CheckOutcome::Pass) {
            result = result.with_finding(message.clone());
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Security
// ═══════════════════════════════════════════════════════════════════════════════

const PLACEHOLDER_MARKERS: &[&str] = &[
    "changeme",
    "change-me",
    "change_me",
    "secret",
    "password",
    "example",
    "default",
    "your-",
    "your_",
    "xxx",
    "todo",
];

/// Production environment and a strong, non-placeholder secret.
pub struct SecurityValidator {
    environment: String,
    production: bool,
    secret: Option<String>,
    min_secret_length: usize,
}

impl SecurityValidator {
    pub fn new(service: &ServiceConfig, secret: Option<String>, min_secret_length: usize) -> Self {
        Self {
            environment: service.environment.clone(),
            production: service.is_production(),
            secret,
            min_secret_length,
        }
    }

    fn is_placeholder(secret: &str) -> bool {
        let lower = secret.to_ascii_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m)) {
            return true;
        }
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => chars.all(|c| c == first),
            None => true,
        }
    }
}

impl CategoryValidator for SecurityValidator {
    fn category(&self) -> Category {
        Category::Security
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let mut result = CategoryResult::pass(self.category());

        if !self.production {
            result.record(
                CheckOutcome::Warning,
                format!("Environment is '{}', not 'production'", self.environment),
            );
        }

        match self.secret.as_deref().map(str::trim) {
            None | Some("") => result.record(CheckOutcome::Fail, "No secret key is configured"),
            Some(secret) if Self::is_placeholder(secret) => {
                result.record(CheckOutcome::Fail, "Secret key looks like a placeholder")
            }
            Some(secret) if secret.len() < self.min_secret_length => result.record(
                CheckOutcome::Warning,
                format!(
                    "Secret key is {} characters, fewer than {}",
                    secret.len(),
                    self.min_secret_length
                ),
            ),
            Some(_) => {}
        }

        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Application
// ═══════════════════════════════════════════════════════════════════════════════

/// Declared build artifacts exist.
pub struct ApplicationValidator {
    artifacts: Vec<PathBuf>,
}

impl ApplicationValidator {
    pub fn new(artifacts: Vec<PathBuf>) -> Self {
        Self { artifacts }
    }
}

impl CategoryValidator for ApplicationValidator {
    fn category(&self) -> Category {
        Category::Application
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let mut result = CategoryResult::pass(self.category());
        for artifact in self.artifacts.iter().filter(|p| !p.exists()) {
            result.record(
                CheckOutcome::Fail,
                format!("Build artifact {} is missing", artifact.display()),
            );
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════════

/// Overall snapshot status.
pub struct HealthValidator;

impl CategoryValidator for HealthValidator {
    fn category(&self) -> Category {
        Category::Health
    }

    fn validate(&self, snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let outcome = match snapshot.status() {
            SnapshotStatus::Healthy => CheckOutcome::Pass,
            SnapshotStatus::Degraded => CheckOutcome::Warning,
            SnapshotStatus::Unhealthy => CheckOutcome::Fail,
        };
        let mut result = CategoryResult::new(self.category(), outcome);
        for probe in snapshot.results().iter().filter(|r| r.status.is_failing()) {
            result = result.with_finding(format!(
                "{} is {}: {}",
                probe.name,
                probe.status,
                probe.message.as_deref().unwrap_or("no detail")
            ));
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Performance
// ═══════════════════════════════════════════════════════════════════════════════

/// Memory, CPU and database latency.
pub struct PerformanceValidator {
    database_latency_budget_ms: u64,
}

impl PerformanceValidator {
    pub fn new(database_latency_budget_ms: u64) -> Self {
        Self {
            database_latency_budget_ms,
        }
    }
}

impl CategoryValidator for PerformanceValidator {
    fn category(&self) -> Category {
        Category::Performance
    }

    fn validate(&self, snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let mut result = CategoryResult::pass(self.category());

        for name in ["memory", "cpu"] {
            if let Some(probe) = snapshot.result(name) {
                if probe.status != ProbeStatus::Healthy {
                    result.record(
                        CheckOutcome::from(probe.status),
                        probe
                            .message
                            .clone()
                            .unwrap_or_else(|| format!("{} is {}", name, probe.status)),
                    );
                }
            }
        }

        if let Some(db) = snapshot.result("database") {
            if db.status == ProbeStatus::Healthy
                && db.response_time_ms > self.database_latency_budget_ms
            {
                result.record(
                    CheckOutcome::Warning,
                    format!(
                        "Database round-trip took {}ms, over the {}ms budget",
                        db.response_time_ms, self.database_latency_budget_ms
                    ),
                );
            }
        }

        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Packaging
// ═══════════════════════════════════════════════════════════════════════════════

/// Package manifest and lockfile present.
pub struct PackagingValidator {
    root: PathBuf,
    required: Vec<String>,
    recommended: Vec<String>,
}

impl PackagingValidator {
    pub fn new(root: PathBuf, required: Vec<String>, recommended: Vec<String>) -> Self {
        Self {
            root,
            required,
            recommended,
        }
    }
}

impl CategoryValidator for PackagingValidator {
    fn category(&self) -> Category {
        Category::Packaging
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        let mut result = CategoryResult::pass(self.category());
        for file in self.required.iter().filter(|f| !self.root.join(f).is_file()) {
            result.record(CheckOutcome::Fail, format!("{} is missing", file));
        }
        for file in self.recommended.iter().filter(|f| !self.root.join(f).is_file()) {
            result.record(CheckOutcome::Warning, format!("{} is missing", file));
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Security Headers
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SecurityHeadersValidator {
    config: SecurityHeadersConfig,
}

impl SecurityHeadersValidator {
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }
}

impl CategoryValidator for SecurityHeadersValidator {
    fn category(&self) -> Category {
        Category::SecurityHeaders
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        if !self.config.enabled {
            return Ok(CategoryResult::fail(
                self.category(),
                "Security headers are disabled",
            ));
        }
        let mut result = CategoryResult::pass(self.category());
        if self.config.hsts_value().is_none() {
            result.record(CheckOutcome::Warning, "Strict-Transport-Security is disabled");
        }
        if self.config.content_security_policy.trim().is_empty() {
            result.record(CheckOutcome::Warning, "Content-Security-Policy is empty");
        }
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rate Limiting
// ═══════════════════════════════════════════════════════════════════════════════

pub struct RateLimitValidator {
    config: RateLimitConfig,
}

impl RateLimitValidator {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }
}

impl CategoryValidator for RateLimitValidator {
    fn category(&self) -> Category {
        Category::RateLimiting
    }

    fn validate(&self, _snapshot: &HealthSnapshot) -> Result<CategoryResult> {
        if !self.config.enabled {
            return Ok(CategoryResult::warning(
                self.category(),
                "Rate limiting is disabled",
            ));
        }
        if self.config.requests_per_second == 0 || self.config.burst_size == 0 {
            return Ok(CategoryResult::fail(
                self.category(),
                "Rate limiting is enabled with a zero rate or burst size",
            ));
        }
        Ok(CategoryResult::pass(self.category()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Criticality, ProbeResult, ServiceInfo};
    use std::collections::HashMap;
    use std::time::Duration;

    fn snapshot(results: Vec<(ProbeResult, Criticality)>) -> HealthSnapshot {
        HealthSnapshot::assemble(results, &ServiceInfo::default(), Duration::from_secs(1))
    }

    fn empty() -> HealthSnapshot {
        snapshot(Vec::new())
    }

    fn service(environment: &str) -> ServiceConfig {
        ServiceConfig {
            environment: environment.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_environment_required_and_recommended() {
        let vars: HashMap<&str, &str> = [("PRESENT", "1"), ("BLANK", " ")].into_iter().collect();
        let lookup = move |k: &str| vars.get(k).map(|v| v.to_string());

        let v = EnvironmentValidator::new(vec!["PRESENT".into()], vec![], lookup.clone());
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);

        let v = EnvironmentValidator::new(vec!["PRESENT".into()], vec!["BLANK".into()], lookup.clone());
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        let v = EnvironmentValidator::new(vec!["MISSING".into()], vec!["BLANK".into()], lookup);
        let result = v.validate(&empty()).unwrap();
        assert_eq!(result.outcome, CheckOutcome::Fail);
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn test_database_validator() {
        let v = DatabaseValidator::new(false);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);

        let v = DatabaseValidator::new(true);
        let healthy = snapshot(vec![(ProbeResult::healthy("database"), Criticality::Critical)]);
        assert_eq!(v.validate(&healthy).unwrap().outcome, CheckOutcome::Pass);

        let down = snapshot(vec![(
            ProbeResult::unhealthy("database").with_message("connection refused"),
            Criticality::Critical,
        )]);
        let result = v.validate(&down).unwrap();
        assert_eq!(result.outcome, CheckOutcome::Fail);
        assert_eq!(result.findings, vec!["connection refused".to_string()]);
    }

    #[test]
    fn test_security_validator() {
        let strong = "k8Hq2vN9xLm4Rt7Wz1Pb6Ys3Gd5Jf0Ac";

        let v = SecurityValidator::new(&service("production"), Some(strong.into()), 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);

        let v = SecurityValidator::new(&service("staging"), Some(strong.into()), 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        let v = SecurityValidator::new(&service("production"), Some("k8Hq2vN9".into()), 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        let v = SecurityValidator::new(&service("production"), Some("changeme-please-0123456789abcdef".into()), 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);

        let v = SecurityValidator::new(&service("production"), Some("a".repeat(40)), 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);

        let v = SecurityValidator::new(&service("production"), None, 32);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);
    }

    #[test]
    fn test_security_validator_environment_ignores_case() {
        let strong = "k8Hq2vN9xLm4Rt7Wz1Pb6Ys3Gd5Jf0Ac";
        for environment in ["Production", "PRODUCTION"] {
            let result = SecurityValidator::new(&service(environment), Some(strong.into()), 32)
                .validate(&empty())
                .unwrap();
            assert_eq!(result.outcome, CheckOutcome::Pass);
            assert!(result.findings.is_empty());
        }
    }

    #[test]
    fn test_application_validator() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app");
        std::fs::write(&artifact, b"bin").unwrap();

        let v = ApplicationValidator::new(vec![artifact.clone()]);
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);

        let v = ApplicationValidator::new(vec![artifact, dir.path().join("missing")]);
        let result = v.validate(&empty()).unwrap();
        assert_eq!(result.outcome, CheckOutcome::Fail);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn test_health_validator_follows_snapshot() {
        let degraded = snapshot(vec![
            (ProbeResult::healthy("database"), Criticality::Critical),
            (
                ProbeResult::warning("github").with_message("no token"),
                Criticality::Optional,
            ),
        ]);
        let result = HealthValidator.validate(&degraded).unwrap();
        assert_eq!(result.outcome, CheckOutcome::Warning);
        assert_eq!(result.findings, vec!["github is warning: no token".to_string()]);

        let down = snapshot(vec![(ProbeResult::unhealthy("database"), Criticality::Critical)]);
        assert_eq!(HealthValidator.validate(&down).unwrap().outcome, CheckOutcome::Fail);
    }

    #[test]
    fn test_performance_validator() {
        let v = PerformanceValidator::new(500);

        let fine = snapshot(vec![
            (ProbeResult::healthy("memory"), Criticality::Critical),
            (ProbeResult::healthy("cpu"), Criticality::Critical),
            (ProbeResult::healthy("database").with_latency_ms(20), Criticality::Critical),
        ]);
        assert_eq!(v.validate(&fine).unwrap().outcome, CheckOutcome::Pass);

        let slow_db = snapshot(vec![(
            ProbeResult::healthy("database").with_latency_ms(800),
            Criticality::Critical,
        )]);
        assert_eq!(v.validate(&slow_db).unwrap().outcome, CheckOutcome::Warning);

        let hot = snapshot(vec![
            (ProbeResult::warning("memory").with_message("82%"), Criticality::Critical),
            (ProbeResult::unhealthy("cpu"), Criticality::Critical),
        ]);
        assert_eq!(v.validate(&hot).unwrap().outcome, CheckOutcome::Fail);
    }

    #[test]
    fn test_packaging_validator() {
        let dir = tempfile::tempdir().unwrap();
        let v = PackagingValidator::new(
            dir.path().to_path_buf(),
            vec!["Cargo.toml".into()],
            vec!["Cargo.lock".into()],
        );
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);

        std::fs::write(dir.path().join("Cargo.toml"), b"[package]").unwrap();
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        std::fs::write(dir.path().join("Cargo.lock"), b"").unwrap();
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);
    }

    #[test]
    fn test_security_headers_validator() {
        let v = SecurityHeadersValidator::new(SecurityHeadersConfig::default());
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);

        let v = SecurityHeadersValidator::new(SecurityHeadersConfig {
            hsts_max_age: 0,
            ..Default::default()
        });
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        let v = SecurityHeadersValidator::new(SecurityHeadersConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);
    }

    #[test]
    fn test_rate_limit_validator() {
        let v = RateLimitValidator::new(RateLimitConfig::default());
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Pass);

        let v = RateLimitValidator::new(RateLimitConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Warning);

        let v = RateLimitValidator::new(RateLimitConfig {
            burst_size: 0,
            ..Default::default()
        });
        assert_eq!(v.validate(&empty()).unwrap().outcome, CheckOutcome::Fail);
    }
}
