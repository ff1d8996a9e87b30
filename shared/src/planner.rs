//! Query planning.
//!
//! Turns a [`QueryDefinition`] and its time range into one concrete request
//! for the metrics source. All relative expressions of one plan resolve
//! against the same [`ReferenceInstant`].

use crate::config::ConfigError;
use crate::models::{QueryDefinition, ResultKind, TimeRangeConfig};
use crate::timeexpr::{
    format_step, parse_duration, ReferenceInstant, ResolutionError, TimeExpression,
};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How the planner treats a time range whose type it does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanMode {
    /// Reject with [`PlanError::UnknownRangeType`].
    Strict,
    /// Fall back to an instant request at the reference.
    #[default]
    Lenient,
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for PlanMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(ConfigError::InvalidValue {
                key: "plan mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A parsed time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeRangeSpec {
    /// Evaluate at one instant.
    Instant(TimeExpression),
    /// Evaluate over `[start, end]` every `step`.
    Range {
        /// Range start.
        start: TimeExpression,
        /// Range end.
        end: TimeExpression,
        /// Resolution step, always positive.
        step: Duration,
    },
}

/// A concrete request for the metrics source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// Instant query.
    Instant {
        /// Query text.
        query: String,
        /// Evaluation instant.
        time: DateTime<FixedOffset>,
    },
    /// Range query.
    Range {
        /// Query text.
        query: String,
        /// Range start.
        start: DateTime<FixedOffset>,
        /// Range end.
        end: DateTime<FixedOffset>,
        /// Resolution step.
        step: Duration,
    },
}

impl SourceRequest {
    /// The query text.
    #[must_use]
    pub fn query(&self) -> &str {
        match self {
            Self::Instant { query, .. } | Self::Range { query, .. } => query,
        }
    }

    /// The kind of result this request produces.
    #[must_use]
    pub fn result_kind(&self) -> ResultKind {
        match self {
            Self::Instant { .. } => ResultKind::Instant,
            Self::Range { .. } => ResultKind::Range,
        }
    }
}

impl fmt::Display for SourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant { query, time } => {
                write!(f, "instant '{query}' at {}", time.to_rfc3339())
            }
            Self::Range {
                query,
                start,
                end,
                step,
            } => write!(
                f,
                "range '{query}' from {} to {} step {}",
                start.to_rfc3339(),
                end.to_rfc3339(),
                format_step(*step)
            ),
        }
    }
}

/// Errors that can occur while planning a query.
///
/// All of them are deterministic: retrying the same plan against the same
/// reference fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A time expression could not be resolved.
    #[error("Failed to resolve {field} time: {source}")]
    Resolution {
        /// Which field (`time`, `start` or `end`).
        field: &'static str,
        /// The underlying error.
        #[source]
        source: ResolutionError,
    },

    /// The range ends before it starts.
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        /// Resolved start.
        start: DateTime<FixedOffset>,
        /// Resolved end.
        end: DateTime<FixedOffset>,
    },

    /// The step is missing, malformed or not positive.
    #[error("Invalid step: '{0}'")]
    InvalidStep(String),

    /// The range type is neither `instant` nor `range`.
    #[error("Unknown time range type: '{0}'")]
    UnknownRangeType(String),
}

/// Builds source requests from query definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner {
    mode: PlanMode,
}

impl QueryPlanner {
    /// Creates a planner.
    #[must_use]
    pub fn new(mode: PlanMode) -> Self {
        Self { mode }
    }

    /// The planner's mode.
    #[must_use]
    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    /// Plans a definition against a reference instant.
    ///
    /// # Errors
    ///
    /// Returns a `PlanError` if the time range cannot be parsed, resolved or
    /// validated.
    pub fn plan(
        &self,
        definition: &QueryDefinition,
        reference: &ReferenceInstant,
    ) -> Result<SourceRequest, PlanError> {
        let spec = self.spec_for(definition.time_range.as_ref())?;
        Self::plan_spec(&definition.query, &spec, reference)
    }

    /// Parses a configured time range.
    ///
    /// A missing configuration is an instant request at the reference.
    ///
    /// # Errors
    ///
    /// Returns a `PlanError` for unparsable expressions, bad steps, and, in
    /// strict mode, unknown range types.
    pub fn spec_for(&self, config: Option<&TimeRangeConfig>) -> Result<TimeRangeSpec, PlanError> {
        let Some(config) = config else {
            return Ok(TimeRangeSpec::Instant(TimeExpression::Now));
        };

        match config.kind.trim() {
            "instant" => Ok(TimeRangeSpec::Instant(parse_field(
                "time",
                config.time.as_deref(),
            )?)),
            "range" => {
                let start = parse_field("start", config.start.as_deref())?;
                let end = parse_field("end", config.end.as_deref())?;
                let step_text = config.step.as_deref().unwrap_or_default();
                let step = parse_duration(step_text)
                    .ok()
                    .filter(|step| !step.is_zero())
                    .ok_or_else(|| PlanError::InvalidStep(step_text.to_string()))?;
                Ok(TimeRangeSpec::Range { start, end, step })
            }
            other => match self.mode {
                PlanMode::Strict => Err(PlanError::UnknownRangeType(other.to_string())),
                PlanMode::Lenient => {
                    tracing::warn!(
                        range_type = %other,
                        "Unknown time range type, falling back to an instant query"
                    );
                    Ok(TimeRangeSpec::Instant(TimeExpression::Now))
                }
            },
        }
    }

    /// Resolves a parsed time range into a request.
    ///
    /// # Errors
    ///
    /// Returns `Resolution` if an expression cannot be resolved and
    /// `InvalidRange` if the resolved start is after the resolved end.
    pub fn plan_spec(
        query: &str,
        spec: &TimeRangeSpec,
        reference: &ReferenceInstant,
    ) -> Result<SourceRequest, PlanError> {
        match spec {
            TimeRangeSpec::Instant(time) => Ok(SourceRequest::Instant {
                query: query.to_string(),
                time: resolve_field("time", time, reference)?,
            }),
            TimeRangeSpec::Range { start, end, step } => {
                let start = resolve_field("start", start, reference)?;
                let end = resolve_field("end", end, reference)?;
                if start > end {
                    return Err(PlanError::InvalidRange { start, end });
                }
                Ok(SourceRequest::Range {
                    query: query.to_string(),
                    start,
                    end,
                    step: *step,
                })
            }
        }
    }
}

fn parse_field(field: &'static str, token: Option<&str>) -> Result<TimeExpression, PlanError> {
    TimeExpression::parse(token.unwrap_or_default())
        .map_err(|source| PlanError::Resolution { field, source })
}

fn resolve_field(
    field: &'static str,
    expression: &TimeExpression,
    reference: &ReferenceInstant,
) -> Result<DateTime<FixedOffset>, PlanError> {
    expression
        .resolve(reference)
        .map_err(|source| PlanError::Resolution { field, source })
}
