use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::features::contacts::models::DateRange;
use crate::shared::constants::DATE_FORMAT;

lazy_static! {
    /// Regex for the `date` query of the contacts listing
    /// Either a single date or a range separated by '-' with optional spaces
    /// - Valid: "2024/01/15", "2024/01/10 - 2024/01/15", "2024/01/10-2024/01/15"
    /// - Invalid: "2024-01-15", "2024/1/15", "2024/01/10 to 2024/01/15"
    pub static ref DATE_QUERY_REGEX: Regex =
        Regex::new(r"^(\d{4}/\d{2}/\d{2})(?:\s*-\s*(\d{4}/\d{2}/\d{2}))?$").unwrap();
}

/// Parse a `YYYY/MM/DD` or `YYYY/MM/DD - YYYY/MM/DD` query into an inclusive range.
/// A single date is the range that starts and ends on that day.
pub fn parse_date_query(raw: &str) -> Result<DateRange, String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();

    let captures = DATE_QUERY_REGEX.captures(unquoted).ok_or_else(|| {
        format!(
            "Invalid date '{}': expected YYYY/MM/DD or YYYY/MM/DD - YYYY/MM/DD",
            raw
        )
    })?;

    let start = parse_date(&captures[1])?;
    let end = match captures.get(2) {
        Some(m) => parse_date(m.as_str())?,
        None => start,
    };

    if start > end {
        return Err(format!(
            "Invalid date range '{}': start date is after end date",
            raw
        ));
    }

    Ok(DateRange { start, end })
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("Invalid date '{}': not a calendar date", value))
}
