//! Reachability probes for optional third-party integrations.
//!
//! These probes never report worse than Warning: a missing credential, a
//! transport error and a non-2xx response all degrade without failing.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::PreflightError;
use crate::health::check::{ProbeResult, ProbeStatus};
use crate::health::probe::Probe;
use crate::telemetry::CredentialRedactor;

/// Upper bound on a single reachability call.
pub const MAX_REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Scheme
// ═══════════════════════════════════════════════════════════════════════════════

/// How the credential is attached to the request.
///
/// Parsed from `bearer`, `basic`, `none` or `header:<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AuthScheme {
    #[default]
    Bearer,
    /// Credential is `user:password`, or a bare key used as the username
    Basic,
    Header(String),
    None,
}

impl FromStr for AuthScheme {
    type Err = PreflightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bearer" => Ok(Self::Bearer),
            "basic" => Ok(Self::Basic),
            "none" => Ok(Self::None),
            other => match other.strip_prefix("header:") {
                Some(name) if !name.trim().is_empty() => Ok(Self::Header(name.trim().to_string())),
                _ => Err(PreflightError::invalid_configuration(format!(
                    "Unknown auth scheme '{}'",
                    other
                ))),
            },
        }
    }
}

impl TryFrom<String> for AuthScheme {
    type Error = PreflightError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "bearer"),
            Self::Basic => write!(f, "basic"),
            Self::Header(name) => write!(f, "header:{}", name),
            Self::None => write!(f, "none"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reachability Probe
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded-timeout GET against a named integration.
pub struct HttpReachabilityProbe {
    name: String,
    url: String,
    credential: Option<String>,
    auth: AuthScheme,
    requires_credential: bool,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpReachabilityProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            credential: None,
            auth: AuthScheme::Bearer,
            requires_credential: true,
            timeout: MAX_REACHABILITY_TIMEOUT,
            client: default_client(),
        }
    }

    /// Source-hosting API.
    pub fn github(token: Option<String>) -> Self {
        Self::new("github", "https://api.github.com/rate_limit").with_credential(token)
    }

    /// Payment provider API.
    pub fn payments(secret_key: Option<String>) -> Self {
        Self::new("payments", "https://api.stripe.com/v1/balance").with_credential(secret_key)
    }

    /// Outbound mail API.
    pub fn email(api_key: Option<String>) -> Self {
        Self::new("email", "https://api.resend.com/domains").with_credential(api_key)
    }

    /// Empty strings count as missing.
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Probe even without a credential.
    pub fn credential_optional(mut self) -> Self {
        self.requires_credential = false;
        self
    }

    /// Clamped to [`MAX_REACHABILITY_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_REACHABILITY_TIMEOUT);
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some() || !self.requires_credential
    }

    fn redact(&self, text: &str) -> String {
        CredentialRedactor::global().redact_secret(text, self.credential.as_deref())
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self.client.get(&self.url).timeout(self.timeout);
        let Some(credential) = self.credential.as_deref() else {
            return request;
        };
        match &self.auth {
            AuthScheme::Bearer => request.bearer_auth(credential),
            AuthScheme::Basic => match credential.split_once(':') {
                Some((user, password)) => request.basic_auth(user, Some(password)),
                None => request.basic_auth(credential, None::<&str>),
            },
            AuthScheme::Header(name) => request.header(name.as_str(), credential),
            AuthScheme::None => request,
        }
    }
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(MAX_REACHABILITY_TIMEOUT)
        .user_agent(concat!("preflight/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl Probe for HttpReachabilityProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> ProbeResult {
        let url = self.redact(&self.url);

        if !self.is_configured() {
            debug!(integration = %self.name, "Integration not configured");
            return ProbeResult::warning(&self.name)
                .with_message(format!("{} is not configured: no credential provided", self.name))
                .with_detail("configured", false)
                .with_detail("url", &url);
        }

        let start = Instant::now();
        let result = ProbeResult::healthy(&self.name)
            .with_detail("configured", true)
            .with_detail("url", &url);

        match self.request().send().await {
            Ok(response) => {
                let code = response.status();
                let result = result
                    .with_latency(start.elapsed())
                    .with_detail("http_status", code.as_u16());

                if code.is_success() {
                    result.with_message(format!("{} is reachable", self.name))
                } else {
                    warn!(integration = %self.name, http_status = code.as_u16(), "Integration returned non-success status");
                    result
                        .with_status(ProbeStatus::Warning)
                        .with_message(format!("{} returned HTTP {}", self.name, code.as_u16()))
                }
            }
            Err(e) => {
                let reason = self.redact(&e.to_string());
                warn!(integration = %self.name, error = %reason, timeout = e.is_timeout(), "Integration unreachable");
                let message = if e.is_timeout() {
                    format!("{} timed out after {}ms", self.name, self.timeout.as_millis())
                } else {
                    format!("{} is unreachable: {}", self.name, reason)
                };
                result
                    .with_latency(start.elapsed())
                    .with_status(ProbeStatus::Warning)
                    .with_message(message)
            }
        }
    }
}
