//! Time expression parser using nom.
//!
//! Accepts three dialects and folds them into [`TimeExpression`]:
//! - offset with optional day truncation: `now`, `now-1d`, `now+2w`, `now-1d/d`, `now/d`
//! - keyword with optional wall-clock time: `today`, `yesterday`, `yesterday@08:30`
//! - bare signed shorthand: `-1d`, `+6h`, `-30m`, `-15s`
//!
//! RFC 3339 timestamps and Unix epoch seconds are accepted as literals.
//! Keywords are case-insensitive; unit letters are not (`M` is months, `m` minutes).

use super::ast::{DayAnchor, OffsetUnit, Sign, TimeExpression};
use super::ResolutionError;
use chrono::{DateTime, NaiveTime};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while_m_n},
    character::complete::{anychar, char, digit1},
    combinator::{all_consuming, map_opt, map_res, opt, value},
    sequence::preceded,
    IResult, Parser,
};

/// Parses a time expression token.
///
/// An empty (or whitespace-only) token is the reference instant.
///
/// # Errors
///
/// Returns `UnsupportedExpression` for tokens outside the grammar and
/// `InvalidTimeOfDay` when a keyword carries an unusable `@` time.
///
/// # Examples
///
/// ```
/// use shared::timeexpr::{parse_expression, TimeExpression};
///
/// assert_eq!(parse_expression("now").unwrap(), TimeExpression::Now);
/// assert_eq!(parse_expression("now-1d/d").unwrap().to_string(), "now-1d/d");
/// assert!(parse_expression("last tuesday").is_err());
/// ```
pub fn parse_expression(input: &str) -> Result<TimeExpression, ResolutionError> {
    let token = input.trim();
    if token.is_empty() {
        return Ok(TimeExpression::Now);
    }

    if let Ok((_, expr)) = all_consuming(now_expression).parse(token) {
        return Ok(expr);
    }

    if let Ok((rest, day)) = day_anchor(token) {
        if rest.is_empty() {
            return Ok(TimeExpression::Anchored {
                day,
                time_of_day: None,
            });
        }
        if let Some(clock) = rest.strip_prefix('@') {
            let time_of_day = parse_time_of_day(clock)
                .ok_or_else(|| ResolutionError::InvalidTimeOfDay(token.to_string()))?;
            return Ok(TimeExpression::Anchored {
                day,
                time_of_day: Some(time_of_day),
            });
        }
        return Err(ResolutionError::UnsupportedExpression(token.to_string()));
    }

    if let Ok((_, expr)) = all_consuming(shorthand_offset).parse(token) {
        return Ok(expr);
    }

    parse_literal(token).ok_or_else(|| ResolutionError::UnsupportedExpression(token.to_string()))
}

// ============================================================================
// now[±N<unit>][/d]
// ============================================================================

fn now_expression(input: &str) -> IResult<&str, TimeExpression> {
    let (input, _) = tag_no_case("now").parse(input)?;
    let (input, offset) = opt((sign, magnitude, offset_unit)).parse(input)?;
    let (input, truncate) = opt(tag("/d")).parse(input)?;

    let base = match offset {
        Some((sign, magnitude, unit)) => TimeExpression::offset(sign, magnitude, unit),
        None => TimeExpression::Now,
    };

    let expr = if truncate.is_some() {
        base.truncated_to_day()
    } else {
        base
    };

    Ok((input, expr))
}

fn offset_unit(input: &str) -> IResult<&str, OffsetUnit> {
    map_opt(anychar, OffsetUnit::from_letter).parse(input)
}

// ============================================================================
// ±N<unit>
// ============================================================================

fn shorthand_offset(input: &str) -> IResult<&str, TimeExpression> {
    let (input, (sign, magnitude, unit)) =
        (sign, magnitude, map_opt(anychar, OffsetUnit::from_shorthand_letter)).parse(input)?;
    Ok((input, TimeExpression::offset(sign, magnitude, unit)))
}

fn sign(input: &str) -> IResult<&str, Sign> {
    alt((value(Sign::Plus, char('+')), value(Sign::Minus, char('-')))).parse(input)
}

fn magnitude(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>()).parse(input)
}

// ============================================================================
// today / yesterday [@HH:MM[:SS]]
// ============================================================================

fn day_anchor(input: &str) -> IResult<&str, DayAnchor> {
    alt((
        value(DayAnchor::Yesterday, tag_no_case("yesterday")),
        value(DayAnchor::Today, tag_no_case("today")),
    ))
    .parse(input)
}

fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let (_, (hour, minute, second)) = all_consuming((
        clock_field,
        preceded(char(':'), clock_field),
        opt(preceded(char(':'), clock_field)),
    ))
    .parse(input)
    .ok()?;

    NaiveTime::from_hms_opt(hour, minute, second.unwrap_or(0))
}

fn clock_field(input: &str) -> IResult<&str, u32> {
    map_res(take_while_m_n(1, 2, |c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<u32>()
    })
    .parse(input)
}

// ============================================================================
// Literals
// ============================================================================

fn parse_literal(token: &str) -> Option<TimeExpression> {
    if token.bytes().all(|b| b.is_ascii_digit()) {
        let seconds = token.parse::<i64>().ok()?;
        let instant = DateTime::from_timestamp(seconds, 0)?;
        return Some(TimeExpression::Literal(instant.fixed_offset()));
    }

    DateTime::parse_from_rfc3339(token)
        .ok()
        .map(TimeExpression::Literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeexpr::TruncationUnit;

    #[test]
    fn test_parse_empty_is_now() {
        assert_eq!(parse_expression("").unwrap(), TimeExpression::Now);
        assert_eq!(parse_expression("   ").unwrap(), TimeExpression::Now);
    }

    #[test]
    fn test_parse_now_case_insensitive() {
        assert_eq!(parse_expression("now").unwrap(), TimeExpression::Now);
        assert_eq!(parse_expression("NOW").unwrap(), TimeExpression::Now);
    }

    #[test]
    fn test_parse_now_offsets() {
        assert_eq!(
            parse_expression("now-1h").unwrap(),
            TimeExpression::offset(Sign::Minus, 1, OffsetUnit::Hour)
        );
        assert_eq!(
            parse_expression("now+30m").unwrap(),
            TimeExpression::offset(Sign::Plus, 30, OffsetUnit::Minute)
        );
        assert_eq!(
            parse_expression("now+1M").unwrap(),
            TimeExpression::offset(Sign::Plus, 1, OffsetUnit::Month)
        );
        assert_eq!(
            parse_expression("now-2y").unwrap(),
            TimeExpression::offset(Sign::Minus, 2, OffsetUnit::Year)
        );
    }

    #[test]
    fn test_parse_truncation() {
        match parse_expression("now-1d/d").unwrap() {
            TimeExpression::Truncated(inner, TruncationUnit::Day) => {
                assert_eq!(*inner, TimeExpression::offset(Sign::Minus, 1, OffsetUnit::Day));
            }
            other => panic!("Expected truncated expression, got {other:?}"),
        }

        assert_eq!(
            parse_expression("now/d").unwrap(),
            TimeExpression::Now.truncated_to_day()
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_expression("yesterday").unwrap(),
            TimeExpression::Anchored {
                day: DayAnchor::Yesterday,
                time_of_day: None
            }
        );
        assert_eq!(
            parse_expression("Today").unwrap(),
            TimeExpression::Anchored {
                day: DayAnchor::Today,
                time_of_day: None
            }
        );
    }

    #[test]
    fn test_parse_keyword_with_time() {
        assert_eq!(
            parse_expression("yesterday@08:30").unwrap(),
            TimeExpression::Anchored {
                day: DayAnchor::Yesterday,
                time_of_day: NaiveTime::from_hms_opt(8, 30, 0)
            }
        );
        assert_eq!(
            parse_expression("today@23:59:59").unwrap(),
            TimeExpression::Anchored {
                day: DayAnchor::Today,
                time_of_day: NaiveTime::from_hms_opt(23, 59, 59)
            }
        );
    }

    #[test]
    fn test_parse_invalid_time_of_day() {
        for token in ["yesterday@25:00", "today@12:60", "today@", "today@noon", "today@1:2:3:4"] {
            assert!(
                matches!(
                    parse_expression(token),
                    Err(ResolutionError::InvalidTimeOfDay(_))
                ),
                "Expected InvalidTimeOfDay for {token}"
            );
        }
    }

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(
            parse_expression("-1d").unwrap(),
            TimeExpression::offset(Sign::Minus, 1, OffsetUnit::Day)
        );
        assert_eq!(
            parse_expression("+6h").unwrap(),
            TimeExpression::offset(Sign::Plus, 6, OffsetUnit::Hour)
        );
        assert_eq!(
            parse_expression("-15s").unwrap(),
            TimeExpression::offset(Sign::Minus, 15, OffsetUnit::Second)
        );
    }

    #[test]
    fn test_parse_literals() {
        match parse_expression("1700000000").unwrap() {
            TimeExpression::Literal(instant) => assert_eq!(instant.timestamp(), 1_700_000_000),
            other => panic!("Expected literal, got {other:?}"),
        }

        match parse_expression("2024-01-15T06:30:45+08:00").unwrap() {
            TimeExpression::Literal(instant) => {
                assert_eq!(instant.to_rfc3339(), "2024-01-15T06:30:45+08:00");
            }
            other => panic!("Expected literal, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_ambiguous_tokens() {
        for token in [
            "1d",
            "-1w",
            "-1M",
            "now-",
            "now-1",
            "now-1x",
            "now-1d/w",
            "now/d/d",
            "nowish",
            "yesterday-1d",
            "today/d",
            "tomorrow",
            "-1d/d",
            "now - 1d",
        ] {
            assert!(
                matches!(
                    parse_expression(token),
                    Err(ResolutionError::UnsupportedExpression(_))
                ),
                "Expected UnsupportedExpression for {token}"
            );
        }
    }

    #[test]
    fn test_unsupported_error_carries_token() {
        let err = parse_expression("  last week ").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnsupportedExpression("last week".to_string())
        );
    }
}
