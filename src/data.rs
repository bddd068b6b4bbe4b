//! Cell-level parsing used by source type inference.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "1", "0", "yes", "no", "t", "f", "y", "n"];

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn is_temporal(value: &str) -> bool {
    parse_naive_date(value).is_ok() || parse_naive_datetime(value).is_ok()
}

/// Integers, decimals, and scientific notation. Thousands separators are
/// accepted when they group digits in threes.
pub fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        return true;
    }
    let unsigned = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    let integral = unsigned.split('.').next().unwrap_or_default();
    let groups: Vec<&str> = integral.split(',').collect();
    if groups.len() < 2 {
        return false;
    }
    let grouped_ok = groups[0].len() <= 3
        && !groups[0].is_empty()
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()));
    grouped_ok && unsigned.replace(',', "").parse::<f64>().is_ok()
}

pub fn is_boolean_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    BOOLEAN_TOKENS.contains(&lowered.as_str())
}
