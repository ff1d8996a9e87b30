//! Health and readiness endpoints.
//!
//! `/health` answers as long as the process is up; `/ready` runs the
//! executor preflight against the metrics source and the record store.

use super::{api_error, ApiError};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Always "ready" on success.
    pub status: &'static str,
}

/// Creates the health check routes.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Creates the readiness routes.
pub fn ready_routes(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(readiness_check))
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "promtrail",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn readiness_check(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    state.executor().preflight().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "not_ready", e.to_string())
    })?;

    Ok(Json(ReadyResponse { status: "ready" }))
}
