//! Wire model of the metrics source and the normalized storage record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Status value of a successful source response.
pub const STATUS_SUCCESS: &str = "success";

/// Envelope returned by the source's query endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponse {
    /// `success` or `error`.
    pub status: String,

    /// Payload, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryData>,

    /// Error class reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Error message reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResponse {
    /// Returns true if the source reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Query payload: a result-type tag and the untyped result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    /// `vector`, `matrix`, `scalar` or `string`.
    pub result_type: String,

    /// The result, decoded according to `result_type`.
    #[serde(default)]
    pub result: Value,
}

/// One series as returned by the source, before any value decoding.
///
/// Instant queries fill `value`; range queries fill `values`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Label set of the series.
    #[serde(default)]
    pub metric: HashMap<String, String>,

    /// Single `[timestamp, "value"]` pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Sequence of `[timestamp, "value"]` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl RawSample {
    /// A series with a single point.
    #[must_use]
    pub fn instant(metric: HashMap<String, String>, value: Value) -> Self {
        Self {
            metric,
            value: Some(value),
            values: Vec::new(),
        }
    }

    /// A series with several points.
    #[must_use]
    pub fn range(metric: HashMap<String, String>, values: Vec<Value>) -> Self {
        Self {
            metric,
            value: None,
            values,
        }
    }
}

/// Which kind of request produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Instant query, `vector` result.
    Instant,
    /// Range query, `matrix` result.
    Range,
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instant => write!(f, "instant"),
            Self::Range => write!(f, "range"),
        }
    }
}

/// A decoded query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Instant vector.
    Vector(Vec<RawSample>),
    /// Range matrix.
    Matrix(Vec<RawSample>),
}

impl QueryResult {
    /// The kind of request this result answers.
    #[must_use]
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Vector(_) => ResultKind::Instant,
            Self::Matrix(_) => ResultKind::Range,
        }
    }

    /// The series of the result.
    #[must_use]
    pub fn samples(&self) -> &[RawSample] {
        match self {
            Self::Vector(samples) | Self::Matrix(samples) => samples,
        }
    }

    /// Returns true if the result has no series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }
}

/// Error building a [`NormalizedRecord`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// NaN or infinite value.
    #[error("Sample value is not finite: {0}")]
    NonFiniteValue(f64),
}

/// A metric sample reshaped for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Query that produced the sample.
    pub query_id: String,
    /// `__name__` label, or the query id when absent.
    pub metric_name: String,
    /// Labels without `__name__`.
    pub labels: HashMap<String, String>,
    value: f64,
    /// Sample timestamp reported by the source.
    pub timestamp: DateTime<Utc>,
    /// When the sample was collected.
    pub collected_at: DateTime<Utc>,
    /// Request kind that produced the sample.
    pub result_type: ResultKind,
}

impl NormalizedRecord {
    /// Builds a record.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is NaN or infinite.
    pub fn new(
        query_id: impl Into<String>,
        metric_name: impl Into<String>,
        labels: HashMap<String, String>,
        value: f64,
        timestamp: DateTime<Utc>,
        collected_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if !value.is_finite() {
            return Err(RecordError::NonFiniteValue(value));
        }

        Ok(Self {
            query_id: query_id.into(),
            metric_name: metric_name.into(),
            labels,
            value,
            timestamp,
            collected_at,
            result_type: ResultKind::Instant,
        })
    }

    /// Sets the result kind.
    #[must_use]
    pub fn with_result_type(mut self, result_type: ResultKind) -> Self {
        self.result_type = result_type;
        self
    }

    /// The sample value, always finite.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_vector_response() {
        let body = json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{"metric": {"__name__": "up"}, "value": [1_700_000_000, "1"]}]
            }
        });

        let response: SourceResponse = serde_json::from_value(body).unwrap();

        assert!(response.is_success());
        let data = response.data.unwrap();
        assert_eq!(data.result_type, "vector");
        let samples: Vec<RawSample> = serde_json::from_value(data.result).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metric.get("__name__").unwrap(), "up");
        assert!(samples[0].values.is_empty());
    }

    #[test]
    fn test_decode_error_response() {
        let body = json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 3"
        });

        let response: SourceResponse = serde_json::from_value(body).unwrap();

        assert!(!response.is_success());
        assert!(response.data.is_none());
        assert_eq!(response.error_type.as_deref(), Some("bad_data"));
    }

    #[test]
    fn test_record_rejects_non_finite_values() {
        let now = Utc::now();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = NormalizedRecord::new("q", "m", HashMap::new(), value, now, now);
            assert!(matches!(result, Err(RecordError::NonFiniteValue(_))));
        }

        let record = NormalizedRecord::new("q", "m", HashMap::new(), 2.5, now, now).unwrap();
        assert!((record.value() - 2.5).abs() < f64::EPSILON);
        assert_eq!(record.result_type, ResultKind::Instant);
    }

    #[test]
    fn test_query_result_kind() {
        assert_eq!(QueryResult::Vector(vec![]).kind(), ResultKind::Instant);
        assert_eq!(QueryResult::Matrix(vec![]).kind(), ResultKind::Range);
        assert!(QueryResult::Matrix(vec![]).is_empty());
    }
}
