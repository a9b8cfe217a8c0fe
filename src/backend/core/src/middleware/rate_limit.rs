//! Token-bucket rate limiting for the health endpoints.
//!
//! A full health run fans out to the database and every integration, so the
//! aggregate endpoint is guarded by a process-wide bucket. Exempt paths (the
//! liveness probe by default) bypass the bucket entirely.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use metrics::counter;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::warn;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sustained refill rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Bucket capacity
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Paths never rate limited
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            exempt_paths: default_exempt_paths(),
        }
    }
}

fn default_enabled() -> bool { true }
fn default_requests_per_second() -> u32 { 10 }
fn default_burst_size() -> u32 { 20 }
fn default_exempt_paths() -> Vec<String> { vec!["/health/live".to_string()] }

// ═══════════════════════════════════════════════════════════════════════════════
// Token Bucket
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_rate: refill_rate as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn time_until_available(&self) -> Duration {
        let needed = 1.0 - self.tokens;
        if needed <= 0.0 || self.refill_rate <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(needed / self.refill_rate)
        }
    }
}

/// Shared limiter state.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<TokenBucket>,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = TokenBucket::new(config.burst_size, config.requests_per_second);
        Self {
            config,
            bucket: Mutex::new(bucket),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|p| p == path)
    }

    pub fn check(&self, path: &str) -> Admission {
        if !self.config.enabled || self.is_exempt(path) {
            return Admission::Allowed;
        }
        let mut bucket = self.bucket.lock();
        if bucket.try_acquire() {
            Admission::Allowed
        } else {
            Admission::Rejected {
                retry_after: bucket.time_until_available(),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config)),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path().to_string();
        let admission = self.limiter.check(&path);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match admission {
                Admission::Allowed => inner.call(request).await,
                Admission::Rejected { retry_after } => {
                    let retry_after_secs = retry_after.as_secs().max(1);
                    warn!(path = %path, retry_after_secs, "Rate limit exceeded");
                    counter!("preflight_rate_limit_rejected_total", "endpoint" => path).increment(1);
                    Ok(rejection(retry_after_secs))
                }
            }
        })
    }
}

fn rejection(retry_after_secs: u64) -> Response {
    let body = serde_json::json!({
        "error": {
            "code": "RATE_LIMIT_EXCEEDED",
            "message": "Too many requests. Please slow down.",
            "retry_after_secs": retry_after_secs,
        }
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert("retry-after", HeaderValue::from(retry_after_secs));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    fn config(burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_second: 1,
            burst_size: burst,
            exempt_paths: vec!["/health/live".to_string()],
        }
    }

    #[test]
    fn test_bucket_drains_then_rejects() {
        let limiter = RateLimiter::new(config(2));
        assert_eq!(limiter.check("/health"), Admission::Allowed);
        assert_eq!(limiter.check("/health"), Admission::Allowed);
        assert!(matches!(limiter.check("/health"), Admission::Rejected { .. }));
    }

    #[test]
    fn test_exempt_path_bypasses_bucket() {
        let limiter = RateLimiter::new(config(1));
        assert_eq!(limiter.check("/health"), Admission::Allowed);
        for _ in 0..5 {
            assert_eq!(limiter.check("/health/live"), Admission::Allowed);
        }
    }

    #[test]
    fn test_disabled_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..config(0)
        });
        for _ in 0..5 {
            assert_eq!(limiter.check("/health"), Admission::Allowed);
        }
    }

    #[test]
    fn test_concurrent_checks_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            requests_per_second: 0,
            ..config(8)
        }));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..4)
                        .filter(|_| limiter.check("/health") == Admission::Allowed)
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 8);
    }

    #[tokio::test]
    async fn test_layer_returns_429() {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(config(1)));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
    }
}
