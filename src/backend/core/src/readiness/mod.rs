//! Deployment readiness scoring.
//!
//! Readiness combines the health snapshot with checks that are not probes
//! (environment, build artifacts, security configuration) into a weighted
//! composite score, then classifies that score into a [`Verdict`].
//!
//! # Scoring
//!
//! Each category yields Pass (100), Warning (70) or Fail (0). The composite is
//! `round(Σ weight × score / Σ weight)` over every declared category. A
//! category whose check did not run counts as Fail.

pub mod classifier;
pub mod validators;

pub use classifier::{classify, recommendations, ReadinessBands, Verdict};
pub use validators::{
    ApplicationValidator, CategoryValidator, DatabaseValidator, EnvironmentValidator,
    HealthValidator, PackagingValidator, PerformanceValidator, RateLimitValidator,
    SecurityHeadersValidator, SecurityValidator,
};

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PreflightError, Result};
use crate::health::{HealthSnapshot, ProbeStatus};

// ═══════════════════════════════════════════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one category check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Pass,
    Warning,
    Fail,
}

impl CheckOutcome {
    pub fn score(&self) -> u8 {
        match self {
            Self::Pass => 100,
            Self::Warning => 70,
            Self::Fail => 0,
        }
    }

    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl From<ProbeStatus> for CheckOutcome {
    fn from(status: ProbeStatus) -> Self {
        match status {
            ProbeStatus::Healthy => Self::Pass,
            ProbeStatus::Warning => Self::Warning,
            ProbeStatus::Unhealthy => Self::Fail,
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Warning => write!(f, "warning"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════════════════════════

/// Scored readiness categories, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Environment,
    Database,
    Security,
    Application,
    Health,
    Performance,
    Packaging,
    SecurityHeaders,
    RateLimiting,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Environment,
        Category::Database,
        Category::Security,
        Category::Application,
        Category::Health,
        Category::Performance,
        Category::Packaging,
        Category::SecurityHeaders,
        Category::RateLimiting,
    ];

    pub fn position(&self) -> usize {
        *self as usize
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Database => "database",
            Self::Security => "security",
            Self::Application => "application",
            Self::Health => "health",
            Self::Performance => "performance",
            Self::Packaging => "packaging",
            Self::SecurityHeaders => "security_headers",
            Self::RateLimiting => "rate_limiting",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Environment => "Environment",
            Self::Database => "Database",
            Self::Security => "Security",
            Self::Application => "Application build",
            Self::Health => "Health probes",
            Self::Performance => "Performance",
            Self::Packaging => "Packaging",
            Self::SecurityHeaders => "Security headers",
            Self::RateLimiting => "Rate limiting",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            Self::Environment => 20.0,
            Self::Database => 20.0,
            Self::Security => 15.0,
            Self::Application => 15.0,
            Self::Health => 10.0,
            Self::Performance => 10.0,
            Self::Packaging => 5.0,
            Self::SecurityHeaders => 3.0,
            Self::RateLimiting => 2.0,
        }
    }

    /// Fixed remediation emitted when the category does not pass.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Environment => {
                "Set every required environment variable before deploying"
            }
            Self::Database => {
                "Verify the database URL and that the database accepts connections within the timeout"
            }
            Self::Security => {
                "Run with environment=production and a strong, non-default secret key"
            }
            Self::Application => "Build the release artifacts before deploying",
            Self::Health => "Resolve the failing health probes listed in the health report",
            Self::Performance => {
                "Investigate memory, CPU and database latency before taking production traffic"
            }
            Self::Packaging => "Commit the package manifest and lockfile",
            Self::SecurityHeaders => {
                "Enable security headers with HSTS and a content security policy"
            }
            Self::RateLimiting => "Enable rate limiting with a non-zero rate and burst size",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-category weights. Need not sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "w_environment")]
    pub environment: f64,
    #[serde(default = "w_database")]
    pub database: f64,
    #[serde(default = "w_security")]
    pub security: f64,
    #[serde(default = "w_application")]
    pub application: f64,
    #[serde(default = "w_health")]
    pub health: f64,
    #[serde(default = "w_performance")]
    pub performance: f64,
    #[serde(default = "w_packaging")]
    pub packaging: f64,
    #[serde(default = "w_security_headers")]
    pub security_headers: f64,
    #[serde(default = "w_rate_limiting")]
    pub rate_limiting: f64,
}

fn w_environment() -> f64 { Category::Environment.default_weight() }
fn w_database() -> f64 { Category::Database.default_weight() }
fn w_security() -> f64 { Category::Security.default_weight() }
fn w_application() -> f64 { Category::Application.default_weight() }
fn w_health() -> f64 { Category::Health.default_weight() }
fn w_performance() -> f64 { Category::Performance.default_weight() }
fn w_packaging() -> f64 { Category::Packaging.default_weight() }
fn w_security_headers() -> f64 { Category::SecurityHeaders.default_weight() }
fn w_rate_limiting() -> f64 { Category::RateLimiting.default_weight() }

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            environment: w_environment(),
            database: w_database(),
            security: w_security(),
            application: w_application(),
            health: w_health(),
            performance: w_performance(),
            packaging: w_packaging(),
            security_headers: w_security_headers(),
            rate_limiting: w_rate_limiting(),
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Environment => self.environment,
            Category::Database => self.database,
            Category::Security => self.security,
            Category::Application => self.application,
            Category::Health => self.health,
            Category::Performance => self.performance,
            Category::Packaging => self.packaging,
            Category::SecurityHeaders => self.security_headers,
            Category::RateLimiting => self.rate_limiting,
        }
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            let w = self.weight(category);
            if !w.is_finite() || w < 0.0 {
                return Err(PreflightError::invalid_configuration(format!(
                    "readiness weight for '{}' must be a non-negative number, got {}",
                    category, w
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Results and Scores
// ═══════════════════════════════════════════════════════════════════════════════

/// What a validator found for its category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResult {
    pub category: Category,
    pub outcome: CheckOutcome,
    pub findings: Vec<String>,
}

impl CategoryResult {
    pub fn new(category: Category, outcome: CheckOutcome) -> Self {
        Self {
            category,
            outcome,
            findings: Vec::new(),
        }
    }

    pub fn pass(category: Category) -> Self {
        Self::new(category, CheckOutcome::Pass)
    }

    pub fn warning(category: Category, finding: impl Into<String>) -> Self {
        Self::new(category, CheckOutcome::Warning).with_finding(finding)
    }

    pub fn fail(category: Category, finding: impl Into<String>) -> Self {
        Self::new(category, CheckOutcome::Fail).with_finding(finding)
    }

    pub fn with_finding(mut self, finding: impl Into<String>) -> Self {
        self.findings.push(finding.into());
        self
    }

    /// Record a finding and degrade the outcome to at least `outcome`.
    pub fn record(&mut self, outcome: CheckOutcome, finding: impl Into<String>) {
        self.outcome = self.outcome.worst(outcome);
        self.findings.push(finding.into());
    }
}

/// Scored category as reported in a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    #[serde(skip)]
    pub category: Category,
    pub status: CheckOutcome,
    pub numeric_score: u8,
    pub weight: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
}

impl CategoryScore {
    pub fn new(category: Category, status: CheckOutcome, weight: f64) -> Self {
        Self {
            category,
            status,
            numeric_score: status.score(),
            weight,
            findings: Vec::new(),
        }
    }
}

/// Output of the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    /// One entry per declared category, in declaration order
    pub categories: Vec<CategoryScore>,
    /// Unrounded weighted average
    pub exact_score: f64,
    /// `exact_score` rounded to the nearest integer
    pub composite_score: u8,
}

/// Weighted composite scoring.
#[derive(Debug, Clone, Default)]
pub struct ReadinessScorer {
    weights: CategoryWeights,
}

impl ReadinessScorer {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    /// Score every declared category. Missing categories count as Fail.
    pub fn score(&self, results: &[CategoryResult]) -> ScoreCard {
        let categories: Vec<CategoryScore> = Category::ALL
            .iter()
            .map(|category| {
                let weight = self.weights.weight(*category);
                match results.iter().find(|r| r.category == *category) {
                    Some(result) => CategoryScore {
                        findings: result.findings.clone(),
                        ..CategoryScore::new(*category, result.outcome, weight)
                    },
                    None => CategoryScore {
                        findings: vec!["Check did not run".to_string()],
                        ..CategoryScore::new(*category, CheckOutcome::Fail, weight)
                    },
                }
            })
            .collect();

        let total_weight: f64 = categories.iter().map(|c| c.weight).sum();
        let exact_score = if total_weight > 0.0 {
            categories
                .iter()
                .map(|c| c.weight * c.numeric_score as f64)
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };

        ScoreCard {
            categories,
            exact_score,
            composite_score: exact_score.round().clamp(0.0, 100.0) as u8,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Verdict
// ═══════════════════════════════════════════════════════════════════════════════

/// Final readiness decision for one evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessVerdict {
    #[serde(serialize_with = "serialize_category_scores")]
    pub category_scores: Vec<CategoryScore>,
    pub composite_score: u8,
    pub exact_score: f64,
    pub verdict: Verdict,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ReadinessVerdict {
    /// Build a verdict from a score card. The verdict is taken from the
    /// rounded composite score.
    pub fn from_score_card(card: ScoreCard, bands: &ReadinessBands) -> Self {
        let verdict = classify(card.composite_score as f64, bands);
        let recommendations = recommendations(&card.categories);
        Self {
            category_scores: card.categories,
            composite_score: card.composite_score,
            exact_score: card.exact_score,
            verdict,
            recommendations,
            timestamp: Utc::now(),
        }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.category_scores.iter().find(|s| s.category == category)
    }
}

fn serialize_category_scores<S: Serializer>(
    scores: &[CategoryScore],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(scores.len()))?;
    for score in scores {
        map.serialize_entry(score.category.key(), score)?;
    }
    map.end()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default)]
    pub weights: CategoryWeights,

    #[serde(default)]
    pub bands: ReadinessBands,

    /// Variables whose absence fails the environment category
    #[serde(default)]
    pub required_env: Vec<String>,

    /// Variables whose absence is a warning
    #[serde(default)]
    pub recommended_env: Vec<String>,

    /// Paths that must exist for the application category to pass
    #[serde(default)]
    pub build_artifacts: Vec<PathBuf>,

    /// Root that manifest paths are resolved against
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    #[serde(default = "default_required_manifests")]
    pub required_manifests: Vec<String>,

    #[serde(default = "default_recommended_manifests")]
    pub recommended_manifests: Vec<String>,

    /// Database round-trip above which performance is degraded, in ms
    #[serde(default = "default_database_latency_budget_ms")]
    pub database_latency_budget_ms: u64,

    /// Where audit artifacts are written; none when unset
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            bands: ReadinessBands::default(),
            required_env: Vec::new(),
            recommended_env: Vec::new(),
            build_artifacts: Vec::new(),
            project_root: default_project_root(),
            required_manifests: default_required_manifests(),
            recommended_manifests: default_recommended_manifests(),
            database_latency_budget_ms: default_database_latency_budget_ms(),
            audit_dir: None,
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_required_manifests() -> Vec<String> {
    vec!["Cargo.toml".to_string()]
}

fn default_recommended_manifests() -> Vec<String> {
    vec!["Cargo.lock".to_string()]
}

fn default_database_latency_budget_ms() -> u64 {
    500
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluator
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs every category validator against a snapshot and classifies the result.
pub struct ReadinessEvaluator {
    validators: Vec<Arc<dyn CategoryValidator>>,
    scorer: ReadinessScorer,
    bands: ReadinessBands,
}

impl ReadinessEvaluator {
    pub fn new(weights: CategoryWeights, bands: ReadinessBands) -> Self {
        Self {
            validators: Vec::new(),
            scorer: ReadinessScorer::new(weights),
            bands,
        }
    }

    pub fn with_validator(mut self, validator: impl CategoryValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// The standard validator set, one per category.
    pub fn from_config(config: &Config) -> Self {
        let readiness = &config.readiness;
        Self::new(readiness.weights.clone(), readiness.bands)
            .with_validator(EnvironmentValidator::from_process_env(
                readiness.required_env.clone(),
                readiness.recommended_env.clone(),
            ))
            .with_validator(DatabaseValidator::new(
                config.database.url.as_deref().is_some_and(|u| !u.trim().is_empty()),
            ))
            .with_validator(SecurityValidator::new(
                &config.service,
                config.security.secret_key.clone(),
                config.security.min_secret_length,
            ))
            .with_validator(ApplicationValidator::new(readiness.build_artifacts.clone()))
            .with_validator(HealthValidator)
            .with_validator(PerformanceValidator::new(readiness.database_latency_budget_ms))
            .with_validator(PackagingValidator::new(
                readiness.project_root.clone(),
                readiness.required_manifests.clone(),
                readiness.recommended_manifests.clone(),
            ))
            .with_validator(SecurityHeadersValidator::new(config.security_headers.clone()))
            .with_validator(RateLimitValidator::new(config.rate_limit.clone()))
    }

    pub fn bands(&self) -> &ReadinessBands {
        &self.bands
    }

    /// Validate, score and classify.
    pub fn evaluate(&self, snapshot: &HealthSnapshot) -> ReadinessVerdict {
        let results: Vec<CategoryResult> = self
            .validators
            .iter()
            .map(|v| run_validator(v.as_ref(), snapshot))
            .collect();

        let card = self.scorer.score(&results);
        let verdict = ReadinessVerdict::from_score_card(card, &self.bands);

        info!(
            composite_score = verdict.composite_score,
            verdict = %verdict.verdict,
            recommendations = verdict.recommendations.len(),
            "Readiness evaluated"
        );
        verdict
    }
}

/// Run one validator, mapping errors and panics to Fail.
fn run_validator(validator: &dyn CategoryValidator, snapshot: &HealthSnapshot) -> CategoryResult {
    let category = validator.category();
    match std::panic::catch_unwind(AssertUnwindSafe(|| validator.validate(snapshot))) {
        Ok(Ok(mut result)) => {
            result.category = category;
            if result.outcome != CheckOutcome::Pass {
                warn!(category = %category, outcome = %result.outcome, findings = ?result.findings, "Readiness category not passing");
            }
            result
        }
        Ok(Err(e)) => {
            error!(category = %category, error = %e, "Readiness validator failed");
            CategoryResult::fail(category, format!("Check could not run: {}", e.user_message()))
        }
        Err(_) => {
            error!(category = %category, "Readiness validator panicked");
            CategoryResult::fail(category, "Check could not run: validator panicked")
        }
    }
}
