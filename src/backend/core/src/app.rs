//! Wiring from [`Config`] to a running health service.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::health::{health_router_with_readiness, HealthService, HealthSnapshot, ProbeRegistry};
use crate::middleware::{RateLimitLayer, SecurityHeadersLayer};
use crate::readiness::{ReadinessEvaluator, ReadinessVerdict};

/// Health service and readiness evaluator built from one configuration.
#[derive(Clone)]
pub struct Preflight {
    config: Arc<Config>,
    service: Arc<HealthService>,
    evaluator: Arc<ReadinessEvaluator>,
}

impl Preflight {
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: Config) -> Result<Self> {
        let registry = ProbeRegistry::from_config(&config)?;
        let service = HealthService::new(registry, config.health.clone(), config.service_info());
        let evaluator = ReadinessEvaluator::from_config(&config);
        Ok(Self::new(config, service, evaluator))
    }

    pub fn new(config: Config, service: HealthService, evaluator: ReadinessEvaluator) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            evaluator: Arc::new(evaluator),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<HealthService> {
        &self.service
    }

    pub fn evaluator(&self) -> &Arc<ReadinessEvaluator> {
        &self.evaluator
    }

    /// One snapshot and the verdict derived from it.
    pub async fn validate(&self) -> (HealthSnapshot, ReadinessVerdict) {
        let snapshot = self.service.check_health().await;
        let verdict = self.evaluator.evaluate(&snapshot);
        (snapshot, verdict)
    }

    /// HTTP router with the configured middleware stack.
    pub fn router(&self) -> Router {
        health_router_with_readiness(
            self.service.clone(),
            self.config.retry.clone(),
            self.evaluator.clone(),
        )
        .layer(RateLimitLayer::new(self.config.rate_limit.clone()))
        .layer(SecurityHeadersLayer::new(self.config.security_headers.clone()))
        .layer(TraceLayer::new_for_http())
    }
}
