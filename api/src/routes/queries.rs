//! Query definition endpoints.

use super::{api_error, ApiError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::config::ConfigError;
use shared::models::{ExecutionRecord, QueryDefinition};

/// Response listing query definitions.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryListResponse {
    /// Enabled definitions, oldest first.
    pub queries: Vec<QueryDefinition>,
    /// Number of definitions.
    pub total_count: usize,
}

/// Creates the query routes.
pub fn queries_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/queries", get(list_queries))
        .route(
            "/api/v1/queries/{id}",
            put(save_query).delete(delete_query),
        )
        .route("/api/v1/queries/{id}/run", post(run_query))
        .route("/api/v1/queries/{id}/enable", post(enable_query))
        .route("/api/v1/queries/{id}/disable", post(disable_query))
        .with_state(state)
}

fn config_error(e: ConfigError) -> ApiError {
    match e {
        ConfigError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        ConfigError::InvalidDefinition { .. } => {
            api_error(StatusCode::BAD_REQUEST, "invalid_definition", e.to_string())
        }
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, "config_error", e.to_string()),
    }
}

async fn list_queries(State(state): State<AppState>) -> Result<Json<QueryListResponse>, ApiError> {
    let queries = state
        .provider()
        .list_enabled_query_definitions()
        .await
        .map_err(config_error)?;

    Ok(Json(QueryListResponse {
        total_count: queries.len(),
        queries,
    }))
}

/// Runs one definition now, enabled or not, and returns its execution record.
async fn run_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let definition = state
        .provider()
        .get_query_definition(&id)
        .await
        .map_err(config_error)?
        .ok_or_else(|| config_error(ConfigError::NotFound(id.clone())))?;

    tracing::info!(query_id = %id, "Manual run requested");

    let reference = state.capture_reference();
    let cancel = state.shutdown().child_token();
    let record = state
        .executor()
        .run_query(&definition, &reference, &cancel)
        .await;

    Ok(Json(record))
}

/// Creates or replaces a definition. Returns 201 for a new id, 200 otherwise.
async fn save_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(definition): Json<QueryDefinition>,
) -> Result<(StatusCode, Json<QueryDefinition>), ApiError> {
    if definition.id != id {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "id_mismatch",
            format!("Body id '{}' does not match path id '{id}'", definition.id),
        ));
    }

    let existed = state
        .provider()
        .get_query_definition(&id)
        .await
        .map_err(config_error)?
        .is_some();

    state
        .provider()
        .save_query_definition(definition.clone())
        .await
        .map_err(config_error)?;

    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(definition)))
}

async fn delete_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .provider()
        .delete_query_definition(&id)
        .await
        .map_err(config_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn enable_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueryDefinition>, ApiError> {
    set_enabled(&state, &id, true).await
}

async fn disable_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueryDefinition>, ApiError> {
    set_enabled(&state, &id, false).await
}

async fn set_enabled(
    state: &AppState,
    id: &str,
    enabled: bool,
) -> Result<Json<QueryDefinition>, ApiError> {
    let definition = state
        .provider()
        .set_query_enabled(id, enabled)
        .await
        .map_err(config_error)?;

    Ok(Json(definition))
}
