//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use reportdesk_runtime::{HealthReport, HealthStatus};
use serde_json::{Value, json};

/// Liveness.
///
/// ```text
/// GET /health → 200 {"status":"ok"}
/// ```
///
/// Does not touch any dependency.
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness of the event emission pipeline.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded (dead letters held)
/// - 503 Service Unavailable: emitter shut down
#[allow(clippy::unused_async)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::new(vec![state.service.emitter().health()]);

    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (status, Json(report))
}
