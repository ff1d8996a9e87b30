//! Integration tests for listing and running query definitions.

use axum::http::StatusCode;
use serde_json::json;
use shared::models::{QueryDefinition, QueryResult, RawSample, TimeRangeConfig};
use shared::source::{SourceError, StaticMetricsSource};

use shared::storage::ConfigProvider;

use super::common::{delete, get, post, put_json, test_app, test_app_with};

fn up_sample(job: &str) -> RawSample {
    serde_json::from_value(json!({
        "metric": {"__name__": "up", "job": job},
        "value": [1_700_000_000, "1"]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_list_empty() {
    let (app, _ctx) = test_app();

    let (status, response) = get(app, "/api/v1/queries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 0);
    assert!(response["queries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_only_enabled_in_order() {
    let (app, _ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![
            QueryDefinition::new("b", "up"),
            QueryDefinition::new("a", "up").with_enabled(false),
            QueryDefinition::new("c", "up"),
        ],
    );

    let (status, response) = get(app, "/api/v1/queries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 2);
    assert_eq!(response["queries"][0]["id"], "b");
    assert_eq!(response["queries"][1]["id"], "c");
}

#[tokio::test]
async fn test_run_query_success() {
    let (app, ctx) = test_app_with(
        StaticMetricsSource::new()
            .with_result(QueryResult::Vector(vec![up_sample("node"), up_sample("api")])),
        vec![QueryDefinition::new("up_status", "up").with_name("Up status")],
    );

    let (status, response) = post(app, "/api/v1/queries/up_status/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["query_id"], "up_status");
    assert_eq!(response["query_name"], "Up status");
    assert_eq!(response["status"], "success");
    assert_eq!(response["records_count"], 2);
    assert_eq!(response["attempts"], 1);
    assert!(response["end_time"].is_string());
    assert!(response["duration_ms"].is_u64());

    assert_eq!(ctx.store.record_count().unwrap(), 2);
    assert_eq!(ctx.store.executions().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_query_failure_is_reported_in_record() {
    let (app, ctx) = test_app_with(
        StaticMetricsSource::new().with_failure(SourceError::NonSuccessStatus {
            status: "error".to_string(),
            message: "bad_data: parse error".to_string(),
        }),
        vec![QueryDefinition::new("broken", "up{")],
    );

    let (status, response) = post(app, "/api/v1/queries/broken/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "failed");
    assert!(response["error_message"]
        .as_str()
        .unwrap()
        .contains("1 attempt"));
    assert_eq!(ctx.store.executions().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_disabled_query_manually() {
    let (app, _ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![QueryDefinition::new("paused", "up").with_enabled(false)],
    );

    let (status, response) = post(app, "/api/v1/queries/paused/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "success");
}

#[tokio::test]
async fn test_run_range_query_sends_range_request() {
    let (app, ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![QueryDefinition::new("daily", "avg(up)")
            .with_time_range(TimeRangeConfig::range("now-1d/d", "now/d", "1h"))],
    );

    let (status, _) = post(app, "/api/v1/queries/daily/run").await;
    assert_eq!(status, StatusCode::OK);

    let requests = ctx.source.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].to_string().starts_with("range 'avg(up)'"));
}

#[tokio::test]
async fn test_run_unknown_query_is_404() {
    let (app, ctx) = test_app();

    let (status, response) = post(app, "/api/v1/queries/missing/run").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "not_found");
    assert!(ctx.store.executions().unwrap().is_empty());
}

#[tokio::test]
async fn test_definitions_added_later_are_listed() {
    let (app, ctx) = test_app();
    ctx.provider
        .upsert(QueryDefinition::new("late", "up"))
        .unwrap();

    let (_, response) = get(app, "/api/v1/queries").await;
    assert_eq!(response["total_count"], 1);
}

#[tokio::test]
async fn test_save_creates_then_replaces() {
    let (app, ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![QueryDefinition::new("first", "up"), QueryDefinition::new("second", "up")],
    );

    let body = json!({"id": "third", "query": "node_load1", "tags": ["host"]});
    let (status, response) = put_json(app.clone(), "/api/v1/queries/third", &body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["id"], "third");
    assert_eq!(response["enabled"], true);

    let body = json!({"id": "first", "query": "up == 0", "retry_count": 2});
    let (status, response) = put_json(app.clone(), "/api/v1/queries/first", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["query"], "up == 0");

    // Replacing keeps the creation order.
    let (_, response) = get(app, "/api/v1/queries").await;
    assert_eq!(response["total_count"], 3);
    assert_eq!(response["queries"][0]["id"], "first");
    assert_eq!(response["queries"][0]["retry_count"], 2);
    assert_eq!(response["queries"][2]["id"], "third");

    let saved = ctx.provider.get_query_definition("third").await.unwrap().unwrap();
    assert_eq!(saved.tags, vec!["host"]);
}

#[tokio::test]
async fn test_save_rejects_invalid_definitions() {
    let (app, ctx) = test_app();

    let (status, response) = put_json(
        app.clone(),
        "/api/v1/queries/q1",
        &json!({"id": "q1", "query": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_definition");

    let (status, response) = put_json(
        app,
        "/api/v1/queries/q1",
        &json!({"id": "other", "query": "up"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "id_mismatch");

    assert!(ctx.provider.get_query_definition("q1").await.unwrap().is_none());
    assert!(ctx.provider.get_query_definition("other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_query() {
    let (app, ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![QueryDefinition::new("doomed", "up")],
    );

    let (status, _) = delete(app.clone(), "/api/v1/queries/doomed").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.provider.get_query_definition("doomed").await.unwrap().is_none());

    let (status, response) = delete(app, "/api/v1/queries/doomed").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "not_found");
}

#[tokio::test]
async fn test_disable_and_enable_query() {
    let (app, _ctx) = test_app_with(
        StaticMetricsSource::new(),
        vec![QueryDefinition::new("a", "up"), QueryDefinition::new("b", "up")],
    );

    let (status, response) = post(app.clone(), "/api/v1/queries/a/disable").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["enabled"], false);

    let (_, response) = get(app.clone(), "/api/v1/queries").await;
    assert_eq!(response["total_count"], 1);
    assert_eq!(response["queries"][0]["id"], "b");

    let (status, response) = post(app.clone(), "/api/v1/queries/a/enable").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["enabled"], true);

    let (_, response) = get(app.clone(), "/api/v1/queries").await;
    assert_eq!(response["queries"][0]["id"], "a");

    let (status, response) = post(app, "/api/v1/queries/missing/enable").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "not_found");
}
