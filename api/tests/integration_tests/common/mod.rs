//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::FixedOffset;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::executor::QueryExecutor;
use shared::models::QueryDefinition;
use shared::source::StaticMetricsSource;
use shared::storage::{InMemoryConfigProvider, InMemoryRecordStore};
use std::sync::Arc;

/// Handles on the in-memory collaborators behind a test app.
pub struct TestContext {
    pub source: Arc<StaticMetricsSource>,
    pub store: Arc<InMemoryRecordStore>,
    pub provider: Arc<InMemoryConfigProvider>,
}

/// Creates a test router at `+08:00` with fresh in-memory collaborators.
pub fn test_app_with(
    source: StaticMetricsSource,
    definitions: Vec<QueryDefinition>,
) -> (Router, TestContext) {
    let source = Arc::new(source);
    let store = InMemoryRecordStore::new_shared();
    let provider = Arc::new(InMemoryConfigProvider::with_definitions(definitions));

    let state = AppState::new(
        QueryExecutor::new(source.clone(), store.clone()),
        provider.clone(),
        FixedOffset::east_opt(8 * 3600).unwrap(),
    );

    (
        create_router(state),
        TestContext {
            source,
            store,
            provider,
        },
    )
}

/// Creates a test router with no definitions and an empty source.
pub fn test_app() -> (Router, TestContext) {
    test_app_with(StaticMetricsSource::new(), Vec::new())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request without a body.
pub async fn post(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Helper to make a PUT request with a JSON body.
pub async fn put_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
    )
    .await
}

/// Helper to make a DELETE request.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}
