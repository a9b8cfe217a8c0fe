//! Configuration management.
//!
//! Settings come from an optional `preflight.{toml,yaml,json}` file, overridden
//! by `PREFLIGHT__SECTION__KEY` environment variables. A handful of
//! conventional variables (`DATABASE_URL`, `GITHUB_TOKEN`, ...) fill gaps the
//! prefixed ones leave.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;
use crate::health::probes::{AuthScheme, HttpReachabilityProbe};
use crate::health::{HealthConfig, ServiceInfo};
use crate::middleware::{RateLimitConfig, SecurityHeadersConfig};
use crate::readiness::ReadinessConfig;
use crate::retry::RetryPolicy;
use crate::telemetry::LoggingConfig;

const ENV_PREFIX: &str = "PREFLIGHT";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "readiness.required_env",
    "readiness.recommended_env",
    "readiness.build_artifacts",
    "readiness.required_manifests",
    "readiness.recommended_manifests",
    "rate_limit.exempt_paths",
];

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub health: HealthConfig,
    pub integrations: IntegrationsConfig,
    pub readiness: ReadinessConfig,
    pub security: SecurityConfig,
    pub security_headers: SecurityHeadersConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long in-flight requests get to finish on shutdown
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            environment: default_environment(),
        }
    }
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the database probe fails when unset
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Round-trip above which the probe reports a warning
    #[serde(default = "default_slow_threshold", with = "humantime_serde")]
    pub slow_threshold: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout: default_connect_timeout(),
            slow_threshold: default_slow_threshold(),
        }
    }
}

/// Settings for one third-party reachability probe.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API token or key sent with the request
    #[serde(default)]
    pub credential: Option<String>,

    /// Overrides the preset endpoint; required for additional integrations
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub auth: Option<AuthScheme>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// When false, a missing credential does not downgrade the result
    #[serde(default = "default_true")]
    pub requires_credential: bool,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credential: None,
            url: None,
            auth: None,
            timeout: None,
            requires_credential: true,
        }
    }
}

impl IntegrationConfig {
    /// Layer these settings over a probe preset.
    pub fn apply(&self, probe: HttpReachabilityProbe) -> HttpReachabilityProbe {
        let mut probe = probe.with_credential(self.credential.clone());
        if let Some(url) = &self.url {
            probe = probe.with_url(url);
        }
        if let Some(auth) = &self.auth {
            probe = probe.with_auth(auth.clone());
        }
        if let Some(timeout) = self.timeout {
            probe = probe.with_timeout(timeout);
        }
        if !self.requires_credential {
            probe = probe.credential_optional();
        }
        probe
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub github: IntegrationConfig,
    pub payments: IntegrationConfig,
    pub email: IntegrationConfig,

    /// Extra endpoints keyed by probe name
    pub additional: BTreeMap<String, IntegrationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Application signing secret inspected by the security category
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_min_secret_length")]
    pub min_secret_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            min_secret_length: default_min_secret_length(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_grace() -> Duration { Duration::from_secs(10) }
fn default_service_name() -> String { "preflight".to_string() }
fn default_environment() -> String { "development".to_string() }
fn default_connect_timeout() -> Duration { Duration::from_secs(5) }
fn default_slow_threshold() -> Duration { Duration::from_secs(1) }
fn default_min_secret_length() -> usize { 32 }
fn default_true() -> bool { true }

impl Config {
    /// Load configuration from environment and an optional `preflight` file
    /// in the working directory.
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name("preflight").required(false))
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::build(config::File::with_name(path))
    }

    fn build(file: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let mut env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            env = env.with_list_parse_key(key);
        }

        let cfg: Config = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        let cfg = cfg.with_conventional_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill unset values from the variables hosting platforms usually export.
    pub fn with_conventional_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fill(&mut self.database.url, || lookup("DATABASE_URL"));
        fill(&mut self.security.secret_key, || lookup("SECRET_KEY"));
        fill(&mut self.integrations.github.credential, || lookup("GITHUB_TOKEN"));
        fill(&mut self.integrations.payments.credential, || lookup("STRIPE_SECRET_KEY"));
        fill(&mut self.integrations.email.credential, || lookup("RESEND_API_KEY"));
        self
    }

    /// Reject settings that would make scoring or retries meaningless.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.readiness.weights.validate()?;
        self.readiness.bands.validate()?;
        Ok(())
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            service: self.service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.service.environment.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn fill(slot: &mut Option<String>, value: impl FnOnce() -> Option<String>) {
    if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
        if let Some(v) = value() {
            *slot = Some(v);
        }
    }
}
