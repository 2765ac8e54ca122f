//! Readiness and metrics endpoints.
//!
//! Liveness (`GET /health`) comes from `ticket_engine_web::handlers`.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Ticket and order stores answer queries
    pub stores: bool,
}

/// Readiness check endpoint.
///
/// Returns 200 OK if the service is ready to accept traffic, 503 otherwise.
/// Probes the stores with an inventory query.
///
/// ```bash
/// curl http://localhost:8080/health/ready
/// # {"ready":true,"stores":true}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let stores = match state.manager.get_available_tickets().await {
        Ok(availability) => {
            crate::metrics::update_remaining(&availability);
            true
        }
        Err(error) => {
            tracing::warn!(error = %error, "Readiness probe failed");
            false
        }
    };

    let status = if stores {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: stores,
            stores,
        }),
    )
}

/// Prometheus scrape endpoint. 404 when no exporter is installed.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics exporter not installed".to_string(),
        ),
    }
}
