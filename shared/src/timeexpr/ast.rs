//! Tagged representation of relative time expressions.

use chrono::{DateTime, FixedOffset, NaiveTime};
use std::fmt;

/// Direction of an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Move forward in time.
    Plus,
    /// Move backward in time.
    Minus,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
        }
    }
}

/// Unit of an offset.
///
/// Seconds, minutes and hours are fixed-length; days, weeks, months and years
/// follow the calendar of the reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetUnit {
    /// `s`
    Second,
    /// `m`
    Minute,
    /// `h`
    Hour,
    /// `d`
    Day,
    /// `w`
    Week,
    /// `M`
    Month,
    /// `y`
    Year,
}

impl OffsetUnit {
    /// Maps a unit letter of the `now±N<unit>` form.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            's' => Some(Self::Second),
            'm' => Some(Self::Minute),
            'h' => Some(Self::Hour),
            'd' => Some(Self::Day),
            'w' => Some(Self::Week),
            'M' => Some(Self::Month),
            'y' => Some(Self::Year),
            _ => None,
        }
    }

    /// Maps a unit letter of the bare `±N<unit>` shorthand, which only knows
    /// days, hours, minutes and seconds.
    #[must_use]
    pub fn from_shorthand_letter(letter: char) -> Option<Self> {
        match letter {
            'd' | 'h' | 'm' | 's' => Self::from_letter(letter),
            _ => None,
        }
    }

    /// Returns the unit letter.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::Second => 's',
            Self::Minute => 'm',
            Self::Hour => 'h',
            Self::Day => 'd',
            Self::Week => 'w',
            Self::Month => 'M',
            Self::Year => 'y',
        }
    }
}

/// The calendar day a keyword expression refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayAnchor {
    /// The reference day.
    Today,
    /// The day before the reference day.
    Yesterday,
}

impl fmt::Display for DayAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Yesterday => write!(f, "yesterday"),
        }
    }
}

/// Calendar unit a resolved instant can be truncated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TruncationUnit {
    /// Start of the calendar day (`/d`).
    Day,
}

/// A parsed time expression.
///
/// Every dialect accepted by [`parse_expression`](super::parse_expression)
/// lands in one of these variants; resolution is a single match over them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeExpression {
    /// An absolute instant.
    Literal(DateTime<FixedOffset>),

    /// The reference instant itself.
    Now,

    /// A keyword day, optionally at a wall-clock time (midnight otherwise).
    Anchored {
        /// Which day.
        day: DayAnchor,
        /// Time of day in the reference zone.
        time_of_day: Option<NaiveTime>,
    },

    /// The reference instant moved by a signed amount.
    Offset {
        /// Direction.
        sign: Sign,
        /// Amount of units.
        magnitude: u32,
        /// Unit of the amount.
        unit: OffsetUnit,
    },

    /// Another expression truncated to the start of a calendar unit.
    Truncated(Box<TimeExpression>, TruncationUnit),
}

impl TimeExpression {
    /// Creates an offset expression.
    #[must_use]
    pub fn offset(sign: Sign, magnitude: u32, unit: OffsetUnit) -> Self {
        Self::Offset {
            sign,
            magnitude,
            unit,
        }
    }

    /// Wraps this expression in a day truncation.
    #[must_use]
    pub fn truncated_to_day(self) -> Self {
        Self::Truncated(Box::new(self), TruncationUnit::Day)
    }
}

impl fmt::Display for TimeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(instant) => write!(f, "{}", instant.to_rfc3339()),
            Self::Now => write!(f, "now"),
            Self::Anchored {
                day,
                time_of_day: Some(time),
            } => write!(f, "{day}@{}", time.format("%H:%M:%S")),
            Self::Anchored {
                day,
                time_of_day: None,
            } => write!(f, "{day}"),
            Self::Offset {
                sign,
                magnitude,
                unit,
            } => write!(f, "now{sign}{magnitude}{}", unit.letter()),
            Self::Truncated(inner, TruncationUnit::Day) => write!(f, "{inner}/d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_letters() {
        assert_eq!(OffsetUnit::from_letter('M'), Some(OffsetUnit::Month));
        assert_eq!(OffsetUnit::from_letter('m'), Some(OffsetUnit::Minute));
        assert_eq!(OffsetUnit::from_letter('x'), None);
        assert_eq!(OffsetUnit::from_shorthand_letter('w'), None);
        assert_eq!(OffsetUnit::from_shorthand_letter('d'), Some(OffsetUnit::Day));
    }

    #[test]
    fn test_display_canonical_forms() {
        let expr = TimeExpression::offset(Sign::Minus, 1, OffsetUnit::Day).truncated_to_day();
        assert_eq!(expr.to_string(), "now-1d/d");

        let expr = TimeExpression::Anchored {
            day: DayAnchor::Yesterday,
            time_of_day: NaiveTime::from_hms_opt(8, 30, 0),
        };
        assert_eq!(expr.to_string(), "yesterday@08:30:00");

        assert_eq!(TimeExpression::Now.to_string(), "now");
    }
}
