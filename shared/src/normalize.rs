//! Sample normalization.
//!
//! Reshapes raw source series into [`NormalizedRecord`]s. Single samples
//! fail fast with `MalformedSample`; batches skip and log malformed samples
//! and keep the rest.

use crate::models::{NormalizedRecord, QueryResult, RawSample, ResultKind, METRIC_NAME_LABEL};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while normalizing a sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The sample does not have the expected shape or content.
    #[error("Malformed sample: {0}")]
    MalformedSample(String),
}

/// Outcome of normalizing a whole result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Records that normalized cleanly.
    pub records: Vec<NormalizedRecord>,
    /// Number of points that were skipped.
    pub skipped: usize,
}

impl NormalizedBatch {
    /// Returns true if points were received but none survived.
    #[must_use]
    pub fn all_skipped(&self) -> bool {
        self.records.is_empty() && self.skipped > 0
    }
}

/// Decodes a `[epoch_seconds, "value"]` pair.
///
/// The timestamp keeps millisecond precision.
///
/// # Errors
///
/// Returns `MalformedSample` if the pair has the wrong shape, the timestamp
/// is not a number, or the value is not a string holding a finite number.
pub fn decode_point(point: &Value) -> Result<(DateTime<Utc>, f64), NormalizationError> {
    let malformed = |reason: &str| NormalizationError::MalformedSample(format!("{reason}: {point}"));

    let [timestamp, value] = point
        .as_array()
        .map(Vec::as_slice)
        .and_then(|pair| <&[Value; 2]>::try_from(pair).ok())
        .ok_or_else(|| malformed("expected a [timestamp, value] pair"))?;

    let seconds = timestamp
        .as_f64()
        .ok_or_else(|| malformed("timestamp is not a number"))?;
    let timestamp = timestamp_from_seconds(seconds).ok_or_else(|| malformed("timestamp out of range"))?;

    let value = value
        .as_str()
        .ok_or_else(|| malformed("value is not a string"))?
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed("value is not a number"))?;
    if !value.is_finite() {
        return Err(malformed("value is not finite"));
    }

    Ok((timestamp, value))
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= 9.0e15 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Metric name of a series: `__name__` if present and non-empty, else the
/// query id.
#[must_use]
pub fn metric_name(labels: &HashMap<String, String>, query_id: &str) -> String {
    labels
        .get(METRIC_NAME_LABEL)
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| query_id.to_string())
}

fn strip_name(labels: &HashMap<String, String>) -> HashMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| key.as_str() != METRIC_NAME_LABEL)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn build_record(
    sample: &RawSample,
    point: &Value,
    query_id: &str,
    collected_at: DateTime<Utc>,
    kind: ResultKind,
) -> Result<NormalizedRecord, NormalizationError> {
    let (timestamp, value) = decode_point(point)?;
    NormalizedRecord::new(
        query_id,
        metric_name(&sample.metric, query_id),
        strip_name(&sample.metric),
        value,
        timestamp,
        collected_at,
    )
    .map(|record| record.with_result_type(kind))
    .map_err(|e| NormalizationError::MalformedSample(e.to_string()))
}

/// Normalizes a single instant sample.
///
/// # Errors
///
/// Returns `MalformedSample` if the sample has no value or the value cannot
/// be decoded.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use serde_json::json;
/// use shared::models::RawSample;
/// use shared::normalize::normalize;
///
/// let sample: RawSample = serde_json::from_value(json!({
///     "metric": {"__name__": "up", "job": "node"},
///     "value": [1_700_000_000, "1"]
/// }))
/// .unwrap();
///
/// let record = normalize(&sample, "q1", Utc::now()).unwrap();
/// assert_eq!(record.metric_name, "up");
/// assert_eq!(record.labels.len(), 1);
/// ```
pub fn normalize(
    sample: &RawSample,
    query_id: &str,
    collected_at: DateTime<Utc>,
) -> Result<NormalizedRecord, NormalizationError> {
    let point = sample.value.as_ref().ok_or_else(|| {
        NormalizationError::MalformedSample("sample has no value".to_string())
    })?;
    build_record(sample, point, query_id, collected_at, ResultKind::Instant)
}

/// Normalizes every point of a result, skipping malformed ones.
///
/// Vector series contribute their single value; matrix series contribute
/// one record per `(timestamp, value)` pair.
#[must_use]
pub fn normalize_result(
    result: &QueryResult,
    query_id: &str,
    collected_at: DateTime<Utc>,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let kind = result.kind();

    for sample in result.samples() {
        let outcomes: Vec<Result<NormalizedRecord, NormalizationError>> = match kind {
            ResultKind::Instant => vec![normalize(sample, query_id, collected_at)],
            ResultKind::Range => sample
                .values
                .iter()
                .map(|point| build_record(sample, point, query_id, collected_at, kind))
                .collect(),
        };

        for outcome in outcomes {
            match outcome {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    tracing::warn!(query_id = %query_id, error = %e, "Skipping malformed sample");
                    batch.skipped += 1;
                }
            }
        }
    }

    batch
}
