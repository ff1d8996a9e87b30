//! Fixed UTC offsets used for calendar arithmetic.

use super::ConfigError;
use chrono::FixedOffset;

/// Zone used when none is configured (UTC+8).
pub const DEFAULT_TIMEZONE: &str = "+08:00";

/// Parses a UTC offset such as `+08:00`, `-0530`, `Z` or `UTC`.
///
/// # Errors
///
/// Returns `InvalidTimezone` if the value is not a valid offset.
///
/// # Examples
///
/// ```
/// use shared::config::parse_utc_offset;
///
/// let zone = parse_utc_offset("+08:00").unwrap();
/// assert_eq!(zone.local_minus_utc(), 8 * 3600);
/// ```
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| ConfigError::InvalidTimezone(value.into()));
    }

    trimmed
        .parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidTimezone(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_offset() {
        assert_eq!(parse_utc_offset("+08:00").unwrap().local_minus_utc(), 28_800);
        assert_eq!(
            parse_utc_offset(DEFAULT_TIMEZONE).unwrap().local_minus_utc(),
            28_800
        );
    }

    #[test]
    fn test_parse_negative_offset() {
        assert_eq!(
            parse_utc_offset("-05:30").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn test_parse_utc_aliases() {
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("z").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_invalid_offset() {
        assert!(matches!(
            parse_utc_offset("Asia/Shanghai"),
            Err(ConfigError::InvalidTimezone(_))
        ));
        assert!(matches!(
            parse_utc_offset(""),
            Err(ConfigError::InvalidTimezone(_))
        ));
    }
}
