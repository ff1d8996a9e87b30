//! Go-style duration parsing (`5s`, `1m30s`, `1.5h`, `250ms`).
//!
//! Query definitions carry their retry interval and range step as strings in
//! this format, as do the service settings.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::many1,
    IResult, Parser,
};
use std::time::Duration;
use thiserror::Error;

const NANOS_PER_MICRO: f64 = 1_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Errors that can occur while parsing a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The input was empty.
    #[error("Empty duration")]
    Empty,

    /// The input is not a valid duration.
    #[error("Invalid duration: '{0}'")]
    Invalid(String),

    /// The duration does not fit into a `Duration`.
    #[error("Duration out of range: '{0}'")]
    Overflow(String),
}

/// Parses a Go-style duration string.
///
/// A duration is one or more `<number><unit>` groups where the number may
/// carry a decimal fraction and the unit is one of `ns`, `us`, `µs`, `ms`,
/// `s`, `m` or `h`. The bare string `0` is accepted as zero.
///
/// # Errors
///
/// Returns a `DurationError` if the input is empty, malformed or too large.
///
/// # Examples
///
/// ```
/// use shared::timeexpr::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// ```
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationError::Empty);
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let (_, components) = all_consuming(many1(component))
        .parse(text)
        .map_err(|_| DurationError::Invalid(text.to_string()))?;

    let nanos: f64 = components.iter().sum();
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(DurationError::Overflow(text.to_string()));
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Renders a step duration the way the metrics source expects it.
///
/// Whole seconds render as `"60s"`, anything finer as fractional seconds.
#[must_use]
pub fn format_step(step: Duration) -> String {
    if step.subsec_nanos() == 0 {
        format!("{}s", step.as_secs())
    } else {
        format!("{}", step.as_secs_f64())
    }
}

fn component(input: &str) -> IResult<&str, f64> {
    let (input, amount) = number(input)?;
    let (input, scale) = unit(input)?;
    Ok((input, amount * scale))
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize((digit1, opt((char('.'), digit1)))),
        |s: &str| s.parse::<f64>(),
    )
    .parse(input)
}

fn unit(input: &str) -> IResult<&str, f64> {
    alt((
        value(1.0, tag("ns")),
        value(NANOS_PER_MICRO, tag("us")),
        value(NANOS_PER_MICRO, tag("µs")),
        value(NANOS_PER_MILLI, tag("ms")),
        value(NANOS_PER_SECOND, tag("s")),
        value(60.0 * NANOS_PER_SECOND, tag("m")),
        value(3600.0 * NANOS_PER_SECOND, tag("h")),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parse_compound_duration() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("1h2m3s").unwrap(),
            Duration::from_secs(3600 + 120 + 3)
        );
    }

    #[test]
    fn test_parse_fractional_duration() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_duration("  30s ").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(parse_duration("abc"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("5"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("5d"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-5s"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("5s garbage"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn test_format_step() {
        assert_eq!(format_step(Duration::from_secs(60)), "60s");
        assert_eq!(format_step(Duration::from_millis(1500)), "1.5");
    }
}
