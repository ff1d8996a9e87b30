//! Integration tests for health and readiness.

use axum::http::StatusCode;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "promtrail");
}

#[tokio::test]
async fn test_ready_when_collaborators_reachable() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "ready");
}

#[tokio::test]
async fn test_not_ready_when_source_unreachable() {
    let (app, ctx) = test_app();
    ctx.source.set_reachable(false);

    let (status, response) = get(app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["error"], "not_ready");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("Metrics source"));
}

#[tokio::test]
async fn test_not_ready_when_store_unreachable() {
    let (app, ctx) = test_app();
    ctx.store.set_reachable(false);

    let (status, response) = get(app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response["message"].as_str().unwrap().contains("Record store"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _ctx) = test_app();

    let (status, _) = get(app, "/api/v1/logs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
