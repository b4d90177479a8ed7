//! # Duration Validation
//!
//! Parses the duration strings users put in annotations.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_FORMAT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:ms|s|m|h|d))+$").ok());

static DURATION_PART: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?P<number>\d+)(?P<unit>ms|s|m|h|d)").ok());

/// Invalid duration string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {0:?}")]
pub struct InvalidDuration(pub String);

/// Parse a duration such as `"90s"`, `"5m"`, `"1h30m"` or `"2d"`
///
/// One or more `<number><unit>` groups are summed. Units are `ms`, `s`, `m`,
/// `h` and `d`; matching is case-insensitive and surrounding whitespace is
/// ignored.
///
/// # Errors
///
/// Returns `InvalidDuration` for empty input, unknown units, or overflow.
pub fn parse_duration(duration_str: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration(duration_str.to_string());
    let normalized = duration_str.trim().to_lowercase();

    let (Some(format), Some(part)) = (DURATION_FORMAT.as_ref(), DURATION_PART.as_ref()) else {
        return Err(invalid());
    };
    if !format.is_match(&normalized) {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    for captures in part.captures_iter(&normalized) {
        let number: u64 = captures["number"].parse().ok().ok_or_else(invalid)?;
        let millis_per_unit: u64 = match &captures["unit"] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return Err(invalid()),
        };
        let millis = number.checked_mul(millis_per_unit).ok_or_else(invalid)?;
        total = total
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(invalid)?;
    }

    Ok(total)
}
