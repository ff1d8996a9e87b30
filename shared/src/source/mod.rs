//! Metrics source abstraction.
//!
//! The executor talks to the metrics source through the [`MetricsSource`]
//! trait. [`PrometheusClient`] speaks the Prometheus HTTP API;
//! [`StaticMetricsSource`] serves scripted responses in-process.

pub mod prometheus;
pub mod static_source;

pub use prometheus::{PrometheusClient, PrometheusConfig};
pub use static_source::StaticMetricsSource;

use crate::models::{QueryResult, RawSample, SourceResponse};
use crate::planner::SourceRequest;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a metrics source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The request did not complete (connection, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source answered with an HTTP error or a non-success status.
    #[error("Metrics source returned {status}: {message}")]
    NonSuccessStatus {
        /// HTTP status or the `status` field of the response.
        status: String,
        /// Error text reported by the source.
        message: String,
    },

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A time-series metrics source.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluates `query` at one instant.
    async fn query_instant(
        &self,
        query: &str,
        time: DateTime<FixedOffset>,
    ) -> Result<QueryResult, SourceError>;

    /// Evaluates `query` over `[start, end]` every `step`.
    async fn query_range(
        &self,
        query: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        step: Duration,
    ) -> Result<QueryResult, SourceError>;

    /// Lists every metric name known to the source.
    async fn list_metric_names(&self) -> Result<Vec<String>, SourceError>;

    /// Checks that the source is reachable.
    async fn ping(&self) -> Result<(), SourceError>;

    /// Executes a planned request.
    async fn fetch(&self, request: &SourceRequest) -> Result<QueryResult, SourceError> {
        match request {
            SourceRequest::Instant { query, time } => self.query_instant(query, *time).await,
            SourceRequest::Range {
                query,
                start,
                end,
                step,
            } => self.query_range(query, *start, *end, *step).await,
        }
    }
}

/// Turns a decoded response envelope into a typed result.
///
/// # Errors
///
/// Returns `NonSuccessStatus` if the source reported an error and
/// `MalformedResponse` if the payload is missing or has an unexpected
/// result type.
pub fn decode_query_response(response: SourceResponse) -> Result<QueryResult, SourceError> {
    if !response.is_success() {
        let message = match (response.error_type, response.error) {
            (Some(kind), Some(error)) => format!("{kind}: {error}"),
            (None, Some(error)) => error,
            (Some(kind), None) => kind,
            (None, None) => "no error message".to_string(),
        };
        return Err(SourceError::NonSuccessStatus {
            status: response.status,
            message,
        });
    }

    let data = response
        .data
        .ok_or_else(|| SourceError::MalformedResponse("Response has no data".to_string()))?;

    let samples = |result: serde_json::Value| {
        serde_json::from_value::<Vec<RawSample>>(result)
            .map_err(|e| SourceError::MalformedResponse(e.to_string()))
    };

    match data.result_type.as_str() {
        "vector" => samples(data.result).map(QueryResult::Vector),
        "matrix" => samples(data.result).map(QueryResult::Matrix),
        other => Err(SourceError::MalformedResponse(format!(
            "Unexpected result type '{other}'"
        ))),
    }
}
