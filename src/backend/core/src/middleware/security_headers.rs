//! Security headers middleware.
use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameOptions {
    #[default]
    Deny,
    SameOrigin,
}

impl FrameOptions {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::SameOrigin => "SAMEORIGIN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub frame_options: FrameOptions,
    /// Zero disables Strict-Transport-Security
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,
    #[serde(default = "default_csp")]
    pub content_security_policy: String,
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
    #[serde(default = "default_true")]
    pub enable_request_id: bool,
    /// Health responses are point-in-time and must not be cached
    #[serde(default = "default_true")]
    pub no_store: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_options: FrameOptions::Deny,
            hsts_max_age: default_hsts_max_age(),
            hsts_include_subdomains: true,
            content_security_policy: default_csp(),
            referrer_policy: default_referrer_policy(),
            enable_request_id: true,
            no_store: true,
        }
    }
}

impl SecurityHeadersConfig {
    pub fn hsts_value(&self) -> Option<String> {
        if self.hsts_max_age == 0 {
            return None;
        }
        let mut hsts = format!("max-age={}", self.hsts_max_age);
        if self.hsts_include_subdomains {
            hsts.push_str("; includeSubDomains");
        }
        Some(hsts)
    }
}

fn default_true() -> bool { true }
fn default_hsts_max_age() -> u64 { 31_536_000 }
fn default_csp() -> String { "default-src 'none'; frame-ancestors 'none'".to_string() }
fn default_referrer_policy() -> String { "no-referrer".to_string() }

#[derive(Debug, Clone)]
pub struct SecurityHeadersLayer {
    config: SecurityHeadersConfig,
}

impl SecurityHeadersLayer {
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersService {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityHeadersService<S> {
    inner: S,
    config: SecurityHeadersConfig,
}

impl<S> Service<Request> for SecurityHeadersService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        if !config.enabled {
            return Box::pin(async move { inner.call(req).await });
        }

        let request_id = if config.enable_request_id {
            let id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            if let Ok(val) = HeaderValue::from_str(&id) {
                req.headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), val);
            }
            Some(id)
        } else {
            None
        };

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            let headers = response.headers_mut();

            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            headers.insert(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static(config.frame_options.as_str()),
            );
            if let Some(v) = config.hsts_value().and_then(|h| HeaderValue::from_str(&h).ok()) {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, v);
            }
            if !config.content_security_policy.is_empty() {
                if let Ok(v) = HeaderValue::from_str(&config.content_security_policy) {
                    headers.insert(header::CONTENT_SECURITY_POLICY, v);
                }
            }
            if let Ok(v) = HeaderValue::from_str(&config.referrer_policy) {
                headers.insert(header::REFERRER_POLICY, v);
            }
            if config.no_store {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            }
            if let Some(v) = request_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
                headers.insert(HeaderName::from_static("x-request-id"), v);
            }
            headers.remove(header::SERVER);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn app(config: SecurityHeadersConfig) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(SecurityHeadersLayer::new(config))
    }

    #[tokio::test]
    async fn test_headers_applied() {
        let response = app(SecurityHeadersConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(headers["cache-control"], "no-store");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = app(SecurityHeadersConfig::default())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_disabled_adds_nothing() {
        let config = SecurityHeadersConfig {
            enabled: false,
            ..Default::default()
        };
        let response = app(config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key("x-frame-options"));
    }

    #[test]
    fn test_hsts_disabled_with_zero_max_age() {
        let config = SecurityHeadersConfig {
            hsts_max_age: 0,
            ..Default::default()
        };
        assert!(config.hsts_value().is_none());
    }
}
