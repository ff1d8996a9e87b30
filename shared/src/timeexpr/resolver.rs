//! Resolution of time expressions against a captured reference instant.

use super::ast::{DayAnchor, OffsetUnit, Sign, TimeExpression, TruncationUnit};
use super::parser::parse_expression;
use super::ResolutionError;
use chrono::{
    DateTime, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc,
};
use serde::{Deserialize, Serialize};

/// The single instant and zone that anchor every relative computation of one
/// resolution chain.
///
/// Capture it once per top-level invocation and pass it to every resolve or
/// plan call so that the start and end of a range agree with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInstant {
    instant: DateTime<Utc>,
    zone: FixedOffset,
}

impl ReferenceInstant {
    /// Creates a reference from an explicit instant.
    #[must_use]
    pub fn new(instant: DateTime<Utc>, zone: FixedOffset) -> Self {
        Self { instant, zone }
    }

    /// Reads the system clock once.
    #[must_use]
    pub fn capture(zone: FixedOffset) -> Self {
        Self::new(Utc::now(), zone)
    }

    /// The anchoring instant.
    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// The zone calendar arithmetic and truncation use.
    #[must_use]
    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// The anchoring instant expressed in the reference zone.
    #[must_use]
    pub fn local(&self) -> DateTime<FixedOffset> {
        self.instant.with_timezone(&self.zone)
    }

    /// The calendar date of the anchoring instant in the reference zone.
    #[must_use]
    pub fn local_date(&self) -> NaiveDate {
        self.local().date_naive()
    }
}

/// A half-open window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start.
    pub start: DateTime<FixedOffset>,
    /// Exclusive end.
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Returns true if `instant` lies inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl TimeExpression {
    /// Parses a token; see [`parse_expression`].
    ///
    /// # Errors
    ///
    /// Returns a `ResolutionError` if the token is outside the grammar.
    pub fn parse(token: &str) -> Result<Self, ResolutionError> {
        parse_expression(token)
    }

    /// Resolves this expression to an absolute instant in the reference zone.
    ///
    /// Resolution is pure: the same expression and reference always produce
    /// the same instant.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if calendar arithmetic leaves the representable
    /// date range.
    pub fn resolve(
        &self,
        reference: &ReferenceInstant,
    ) -> Result<DateTime<FixedOffset>, ResolutionError> {
        let out_of_range = || ResolutionError::OutOfRange(self.to_string());

        match self {
            Self::Literal(instant) => Ok(instant.with_timezone(&reference.zone())),
            Self::Now => Ok(reference.local()),
            Self::Anchored { day, time_of_day } => {
                let today = reference.local_date();
                let date = match day {
                    DayAnchor::Today => Some(today),
                    DayAnchor::Yesterday => today.pred_opt(),
                }
                .ok_or_else(out_of_range)?;
                let time = time_of_day.unwrap_or(NaiveTime::MIN);
                local_instant(date.and_time(time), reference.zone()).ok_or_else(out_of_range)
            }
            Self::Offset {
                sign,
                magnitude,
                unit,
            } => apply_offset(reference.local(), *sign, *magnitude, *unit).ok_or_else(out_of_range),
            Self::Truncated(inner, TruncationUnit::Day) => {
                let instant = inner.resolve(reference)?;
                local_instant(
                    instant.date_naive().and_time(NaiveTime::MIN),
                    reference.zone(),
                )
                .ok_or_else(out_of_range)
            }
        }
    }
}

/// Parses and resolves a token against a reference instant.
///
/// # Errors
///
/// Returns a `ResolutionError` if the token cannot be parsed or resolved.
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone, Utc};
/// use shared::timeexpr::{resolve, ReferenceInstant};
///
/// let zone = FixedOffset::east_opt(8 * 3600).unwrap();
/// let reference = ReferenceInstant::new(
///     Utc.with_ymd_and_hms(2024, 1, 15, 6, 30, 45).unwrap(),
///     zone,
/// );
///
/// let start = resolve("now-1d/d", &reference).unwrap();
/// assert_eq!(start.to_rfc3339(), "2024-01-14T00:00:00+08:00");
/// ```
pub fn resolve(
    token: &str,
    reference: &ReferenceInstant,
) -> Result<DateTime<FixedOffset>, ResolutionError> {
    parse_expression(token)?.resolve(reference)
}

/// Yesterday 00:00:00 to today 00:00:00 in the reference zone.
///
/// Stable for every reference that falls on the same calendar day.
///
/// # Errors
///
/// Returns `OutOfRange` at the edges of the representable date range.
pub fn yesterday_window(reference: &ReferenceInstant) -> Result<TimeWindow, ResolutionError> {
    day_window(reference, DayAnchor::Yesterday)
}

/// Today 00:00:00 to tomorrow 00:00:00 in the reference zone.
///
/// # Errors
///
/// Returns `OutOfRange` at the edges of the representable date range.
pub fn today_window(reference: &ReferenceInstant) -> Result<TimeWindow, ResolutionError> {
    day_window(reference, DayAnchor::Today)
}

fn day_window(
    reference: &ReferenceInstant,
    day: DayAnchor,
) -> Result<TimeWindow, ResolutionError> {
    let start = TimeExpression::Anchored {
        day,
        time_of_day: None,
    }
    .resolve(reference)?;
    let end = start
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ResolutionError::OutOfRange(format!("{day} window")))?;
    Ok(TimeWindow { start, end })
}

fn local_instant(naive: NaiveDateTime, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    naive.and_local_timezone(zone).single()
}

// Months and years clamp to the last day of the target month
// (2024-01-31 + 1M = 2024-02-29).
fn apply_offset(
    base: DateTime<FixedOffset>,
    sign: Sign,
    magnitude: u32,
    unit: OffsetUnit,
) -> Option<DateTime<FixedOffset>> {
    let amount = i64::from(magnitude);
    match unit {
        OffsetUnit::Second | OffsetUnit::Minute | OffsetUnit::Hour => {
            let delta = match unit {
                OffsetUnit::Second => TimeDelta::try_seconds(amount)?,
                OffsetUnit::Minute => TimeDelta::try_minutes(amount)?,
                _ => TimeDelta::try_hours(amount)?,
            };
            match sign {
                Sign::Plus => base.checked_add_signed(delta),
                Sign::Minus => base.checked_sub_signed(delta),
            }
        }
        OffsetUnit::Day | OffsetUnit::Week => {
            let days = if unit == OffsetUnit::Week {
                u64::from(magnitude) * 7
            } else {
                u64::from(magnitude)
            };
            match sign {
                Sign::Plus => base.checked_add_days(Days::new(days)),
                Sign::Minus => base.checked_sub_days(Days::new(days)),
            }
        }
        OffsetUnit::Month | OffsetUnit::Year => {
            let months = if unit == OffsetUnit::Year {
                magnitude.checked_mul(12)?
            } else {
                magnitude
            };
            match sign {
                Sign::Plus => base.checked_add_months(Months::new(months)),
                Sign::Minus => base.checked_sub_months(Months::new(months)),
            }
        }
    }
}
