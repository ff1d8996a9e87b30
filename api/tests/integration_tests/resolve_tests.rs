//! Integration tests for time expression previews.
//!
//! The test app runs at `+08:00`; every request pins the reference with `at`.

use axum::http::StatusCode;

use super::common::{get, test_app};

const AT: &str = "2024-01-15T14:30:45Z";

fn resolve_uri(expr: &str) -> String {
    format!(
        "/api/v1/resolve?expr={}&at={}",
        urlencoding::encode(expr),
        urlencoding::encode(AT)
    )
}

#[tokio::test]
async fn test_resolve_truncated_offset() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, &resolve_uri("now-1d/d")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["canonical"], "now-1d/d");
    assert_eq!(response["reference"], "2024-01-15T22:30:45+08:00");
    assert_eq!(response["resolved"], "2024-01-14T00:00:00+08:00");
}

#[tokio::test]
async fn test_resolve_keyword_with_time() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, &resolve_uri("yesterday@08:30")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["resolved"], "2024-01-14T08:30:00+08:00");
}

#[tokio::test]
async fn test_resolve_shorthand() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, &resolve_uri("-2h")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["resolved"], "2024-01-15T20:30:45+08:00");
}

#[tokio::test]
async fn test_resolve_empty_is_reference() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, &resolve_uri("")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["resolved"], response["reference"]);
}

#[tokio::test]
async fn test_resolve_unsupported_expression() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, &resolve_uri("last tuesday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_expression");
    assert!(response["message"].as_str().unwrap().contains("last tuesday"));
}

#[tokio::test]
async fn test_resolve_invalid_reference() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, "/api/v1/resolve?expr=now&at=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_reference");
}

#[tokio::test]
async fn test_day_windows() {
    let (app, _ctx) = test_app();

    let (status, response) = get(
        app,
        &format!("/api/v1/window?at={}", urlencoding::encode(AT)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["yesterday"]["start"], "2024-01-14T00:00:00+08:00");
    assert_eq!(response["yesterday"]["end"], "2024-01-15T00:00:00+08:00");
    assert_eq!(response["today"]["end"], "2024-01-16T00:00:00+08:00");
}
