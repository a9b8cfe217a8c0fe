//! Health check HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use super::{HealthService, LIVENESS_BODY};
use crate::error::Result;
use crate::readiness::ReadinessEvaluator;
use crate::retry::RetryPolicy;

/// Shared state for the health routes
#[derive(Clone)]
pub struct HealthState {
    service: Arc<HealthService>,
    retry: RetryPolicy,
    evaluator: Option<Arc<ReadinessEvaluator>>,
}

/// Routes for `/health`, `/health/live` and integration retests.
pub fn health_router(service: Arc<HealthService>, retry: RetryPolicy) -> Router {
    routes(HealthState {
        service,
        retry,
        evaluator: None,
    })
}

/// [`health_router`] plus `GET /health/ready`, which scores the snapshot.
pub fn health_router_with_readiness(
    service: Arc<HealthService>,
    retry: RetryPolicy,
    evaluator: Arc<ReadinessEvaluator>,
) -> Router {
    routes(HealthState {
        service,
        retry,
        evaluator: Some(evaluator),
    })
}

fn routes(state: HealthState) -> Router {
    let ready = state.evaluator.is_some();
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/integrations/:name/retest", post(retest_integration));

    let router = if ready {
        router.route("/health/ready", get(readiness_check))
    } else {
        router
    };
    router.with_state(state)
}

/// GET /health - Full snapshot
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    let snapshot = state.service.check_health().await;
    let status = StatusCode::from_u16(snapshot.http_status_code())
        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(snapshot))
}

/// GET /health/live - Process is up; runs no probes
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, LIVENESS_BODY)
}

/// GET /health/ready - Readiness verdict for the current snapshot
pub async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let snapshot = state.service.check_health().await;
    match &state.evaluator {
        Some(evaluator) => {
            let verdict = evaluator.evaluate(&snapshot);
            let status = if verdict.verdict.is_deployable() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(verdict)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /health/integrations/:name/retest - Retry one probe until healthy
pub async fn retest_integration(
    State(state): State<HealthState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let result = state.service.retest(&name, &state.retry).await?;
    Ok((StatusCode::OK, Json(result)))
}
