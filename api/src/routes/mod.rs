//! API route definitions.
//!
//! This module organizes all HTTP routes for the promtrail service.

mod health;
mod queries;
mod resolve;

pub use health::{health_routes, ready_routes};
pub use queries::queries_routes;
pub use resolve::resolve_routes;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error body shared by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Error half of a handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            message: message.into(),
        }),
    )
}
