//! Time expression preview endpoints.
//!
//! Lets operators check what an expression resolves to before putting it in
//! a query definition.

use super::{api_error, ApiError};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::timeexpr::{today_window, yesterday_window, ReferenceInstant, TimeExpression, TimeWindow};

/// Query parameters for `/api/v1/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    /// Expression to resolve; empty means `now`.
    #[serde(default)]
    pub expr: String,
    /// Reference instant (RFC 3339); the current time when absent.
    pub at: Option<String>,
}

/// Query parameters for `/api/v1/window`.
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Reference instant (RFC 3339); the current time when absent.
    pub at: Option<String>,
}

/// A resolved expression.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// The expression as given.
    pub expression: String,
    /// Canonical form of the parsed expression.
    pub canonical: String,
    /// The reference it was resolved against.
    pub reference: String,
    /// The resolved instant.
    pub resolved: String,
}

/// Yesterday and today in the configured zone.
#[derive(Debug, Serialize, Deserialize)]
pub struct WindowResponse {
    /// The reference the windows were computed for.
    pub reference: String,
    /// `[yesterday 00:00, today 00:00)`.
    pub yesterday: TimeWindow,
    /// `[today 00:00, tomorrow 00:00)`.
    pub today: TimeWindow,
}

/// Creates the resolve routes.
pub fn resolve_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/resolve", get(resolve_expression))
        .route("/api/v1/window", get(day_windows))
        .with_state(state)
}

fn reference_at(state: &AppState, at: Option<&str>) -> Result<ReferenceInstant, ApiError> {
    match at {
        None => Ok(state.capture_reference()),
        Some(at) => DateTime::parse_from_rfc3339(at)
            .map(|instant| ReferenceInstant::new(instant.with_timezone(&Utc), state.timezone()))
            .map_err(|e| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_reference",
                    format!("Invalid reference '{at}': {e}"),
                )
            }),
    }
}

async fn resolve_expression(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let reference = reference_at(&state, params.at.as_deref())?;
    let invalid = |e: shared::timeexpr::ResolutionError| {
        api_error(StatusCode::BAD_REQUEST, "invalid_expression", e.to_string())
    };

    let expression = TimeExpression::parse(&params.expr).map_err(invalid)?;
    let resolved = expression.resolve(&reference).map_err(invalid)?;

    Ok(Json(ResolveResponse {
        expression: params.expr,
        canonical: expression.to_string(),
        reference: reference.local().to_rfc3339(),
        resolved: resolved.to_rfc3339(),
    }))
}

async fn day_windows(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<WindowResponse>, ApiError> {
    let reference = reference_at(&state, params.at.as_deref())?;
    let out_of_range =
        |e: shared::timeexpr::ResolutionError| api_error(StatusCode::BAD_REQUEST, "out_of_range", e.to_string());

    Ok(Json(WindowResponse {
        reference: reference.local().to_rfc3339(),
        yesterday: yesterday_window(&reference).map_err(out_of_range)?,
        today: today_window(&reference).map_err(out_of_range)?,
    }))
}
