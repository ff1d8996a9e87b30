//! Query definition model.
//!
//! A `QueryDefinition` is owned by the configuration collaborator; the
//! executor only reads it.

use crate::timeexpr::parse_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Retry interval used when a definition carries a malformed one.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Time range settings of a query definition, as configured.
///
/// `type` is `instant` or `range`. Instant queries use `time`; range queries
/// use `start`, `end` and `step`. Values stay strings until planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeConfig {
    /// The range type (`instant` or `range`).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Evaluation time for instant queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Range start expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// Range end expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    /// Range step as a duration string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl TimeRangeConfig {
    /// An instant evaluation at the given time expression.
    #[must_use]
    pub fn instant(time: impl Into<String>) -> Self {
        Self {
            kind: "instant".to_string(),
            time: Some(time.into()),
            ..Self::default()
        }
    }

    /// A range evaluation.
    #[must_use]
    pub fn range(start: impl Into<String>, end: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            kind: "range".to_string(),
            start: Some(start.into()),
            end: Some(end.into()),
            step: Some(step.into()),
            ..Self::default()
        }
    }
}

/// A configured query.
///
/// # Example
///
/// ```
/// use shared::models::{QueryDefinition, TimeRangeConfig};
///
/// let query = QueryDefinition::new("daily_up", "up")
///     .with_name("Daily availability")
///     .with_time_range(TimeRangeConfig::range("now-1d/d", "now/d", "1h"))
///     .with_retry(2, "10s");
///
/// assert!(query.validate_definition().is_ok());
/// assert_eq!(query.retry_interval_duration().as_secs(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QueryDefinition {
    /// Unique identifier.
    #[validate(length(min = 1, message = "Query id cannot be empty"))]
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Query text sent to the metrics source.
    #[validate(length(min = 1, message = "Query text cannot be empty"))]
    pub query: String,

    /// Evaluation window; an instant query at the reference when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRangeConfig>,

    /// Retries after the first attempt.
    #[serde(default)]
    pub retry_count: u32,

    /// Pause between attempts as a duration string.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,

    /// Whether the definition is scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_retry_interval() -> String {
    "5s".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Errors that can occur during query definition validation.
#[derive(Debug, Error)]
pub enum QueryValidationError {
    /// The id is empty.
    #[error("Query id cannot be empty")]
    EmptyId,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl QueryDefinition {
    /// Creates an enabled instant query without retries.
    #[must_use]
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            query: query.into(),
            time_range: None,
            retry_count: 0,
            retry_interval: default_retry_interval(),
            enabled: true,
            tags: Vec::new(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the time range.
    #[must_use]
    pub fn with_time_range(mut self, time_range: TimeRangeConfig) -> Self {
        self.time_range = Some(time_range);
        self
    }

    /// Sets the retry count and interval.
    #[must_use]
    pub fn with_retry(mut self, retry_count: u32, retry_interval: impl Into<String>) -> Self {
        self.retry_count = retry_count;
        self.retry_interval = retry_interval.into();
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Total number of attempts the executor may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// The retry interval, or [`DEFAULT_RETRY_INTERVAL`] if it is malformed.
    #[must_use]
    pub fn retry_interval_duration(&self) -> Duration {
        parse_duration(&self.retry_interval).unwrap_or(DEFAULT_RETRY_INTERVAL)
    }

    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or the query text is empty.
    pub fn validate_definition(&self) -> Result<(), QueryValidationError> {
        if self.id.trim().is_empty() {
            return Err(QueryValidationError::EmptyId);
        }
        self.validate()?;
        Ok(())
    }
}
