//! Prometheus HTTP API client.

use super::{decode_query_response, MetricsSource, SourceError};
use crate::models::{QueryResult, SourceResponse};
use crate::timeexpr::{format_step, parse_duration};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default Prometheus base URL.
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// Default request timeout.
pub const DEFAULT_PROMETHEUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Prometheus connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrometheusConfig {
    /// Base URL, without a trailing slash.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROMETHEUS_URL.to_string(),
            timeout: DEFAULT_PROMETHEUS_TIMEOUT,
        }
    }
}

impl PrometheusConfig {
    /// Loads settings from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `PROMTRAIL_PROMETHEUS_URL`: Base URL (default: <http://localhost:9090>)
    /// - `PROMTRAIL_PROMETHEUS_TIMEOUT`: Request timeout (default: `30s`)
    ///
    /// A malformed timeout falls back to the default with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let url = std::env::var("PROMTRAIL_PROMETHEUS_URL")
            .unwrap_or_else(|_| DEFAULT_PROMETHEUS_URL.to_string());
        let timeout = std::env::var("PROMTRAIL_PROMETHEUS_TIMEOUT")
            .ok()
            .map_or(DEFAULT_PROMETHEUS_TIMEOUT, |value| {
                parse_duration(&value).unwrap_or_else(|e| {
                    tracing::warn!(value = %value, error = %e, "Invalid Prometheus timeout, using default");
                    DEFAULT_PROMETHEUS_TIMEOUT
                })
            });

        Self::new(url, timeout)
    }

    /// Creates settings from explicit values.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

/// Response of the label values endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelValuesResponse {
    status: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the Prometheus HTTP API.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: String,
}

impl PrometheusClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(config: &PrometheusConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("promtrail/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
        })
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "Querying Prometheus");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::NonSuccessStatus {
                status: status.to_string(),
                message: body,
            });
        }

        Ok(body)
    }

    async fn query(&self, path: &str, params: &[(&str, String)]) -> Result<QueryResult, SourceError> {
        let body = self.get(path, params).await?;
        let response: SourceResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::MalformedResponse(e.to_string()))?;
        decode_query_response(response)
    }
}

fn format_time(time: DateTime<FixedOffset>) -> String {
    time.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn query_instant(
        &self,
        query: &str,
        time: DateTime<FixedOffset>,
    ) -> Result<QueryResult, SourceError> {
        self.query(
            "/api/v1/query",
            &[("query", query.to_string()), ("time", format_time(time))],
        )
        .await
    }

    async fn query_range(
        &self,
        query: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        step: Duration,
    ) -> Result<QueryResult, SourceError> {
        self.query(
            "/api/v1/query_range",
            &[
                ("query", query.to_string()),
                ("start", format_time(start)),
                ("end", format_time(end)),
                ("step", format_step(step)),
            ],
        )
        .await
    }

    async fn list_metric_names(&self) -> Result<Vec<String>, SourceError> {
        let body = self.get("/api/v1/label/__name__/values", &[]).await?;
        let response: LabelValuesResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::MalformedResponse(e.to_string()))?;

        if response.status != crate::models::STATUS_SUCCESS {
            return Err(SourceError::NonSuccessStatus {
                status: response.status,
                message: response.error.unwrap_or_default(),
            });
        }

        Ok(response.data)
    }

    async fn ping(&self) -> Result<(), SourceError> {
        self.query("/api/v1/query", &[("query", "up".to_string())])
            .await
            .map(|_| ())
    }
}
