//! Relative time expressions.
//!
//! Turns human-friendly tokens such as `now`, `now-1d/d`, `yesterday@00:00`
//! or `-1d` into absolute instants. Every resolution takes an explicit
//! [`ReferenceInstant`]; nothing in this module reads the clock except
//! [`ReferenceInstant::capture`].
//!
//! # Example
//!
//! ```
//! use chrono::{FixedOffset, TimeZone, Utc};
//! use shared::timeexpr::{yesterday_window, ReferenceInstant};
//!
//! let zone = FixedOffset::east_opt(8 * 3600).unwrap();
//! let reference = ReferenceInstant::new(Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap(), zone);
//!
//! let window = yesterday_window(&reference).unwrap();
//! assert_eq!(window.start.to_rfc3339(), "2024-01-14T00:00:00+08:00");
//! assert_eq!(window.end.to_rfc3339(), "2024-01-15T00:00:00+08:00");
//! ```

mod ast;
mod duration;
mod parser;
mod resolver;

pub use ast::*;
pub use duration::{format_step, parse_duration, DurationError};
pub use parser::parse_expression;
pub use resolver::{resolve, today_window, yesterday_window, ReferenceInstant, TimeWindow};

use thiserror::Error;

/// Errors that can occur while parsing or resolving a time expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The token is not part of the expression grammar.
    #[error("Unsupported time expression: '{0}'")]
    UnsupportedExpression(String),

    /// A keyword expression carries an invalid `@HH:MM[:SS]` suffix.
    #[error("Invalid time of day in '{0}'")]
    InvalidTimeOfDay(String),

    /// Calendar arithmetic left the representable date range.
    #[error("Time expression '{0}' is out of range")]
    OutOfRange(String),
}
