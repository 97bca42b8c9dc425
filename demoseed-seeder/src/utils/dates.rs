//! Date and field formatting helpers
//!
//! The target application exchanges dates as `%m-%d-%y` strings and
//! expects phone numbers and URLs in its own display formats. Values that
//! cannot be parsed pass through unchanged; the application validates its
//! own forms.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

/// Formats accepted when parsing record date fields
const FLEXIBLE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
    "%m-%d-%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// Date format the application's forms expect
const APP_DATE_FORMAT: &str = "%m-%d-%y";

/// Parse a date value in any of the supported formats. Date-only values
/// get a midnight time.
pub fn parse_flexible(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in FLEXIBLE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    warn!("Cannot parse date '{trimmed}' with any supported format");
    None
}

/// Format a date value the way the application's forms expect, passing
/// the original through when it cannot be parsed.
pub fn format_app_date(value: &str) -> String {
    match parse_flexible(value) {
        Some(parsed) => parsed.format(APP_DATE_FORMAT).to_string(),
        None => value.to_string(),
    }
}

/// Format a raw phone number as `(XXX) XXX-XXXX`. Numbers that are not
/// 10 digits (or 11 with a leading 1) pass through unchanged.
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == 10 {
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
    } else {
        raw.to_string()
    }
}

/// Ensure a URL carries a scheme.
pub fn format_url(raw: &str) -> String {
    let url = raw.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_datetime_and_date_only() {
        let full = parse_flexible("2024-03-15 10:30:00").unwrap();
        assert_eq!(full.format("%H:%M").to_string(), "10:30");

        let date_only = parse_flexible("2024-03-15").unwrap();
        assert_eq!(date_only.format("%H:%M:%S").to_string(), "00:00:00");

        assert!(parse_flexible("03/15/2024").is_some());
        assert!(parse_flexible("03-15-24").is_some());
        assert!(parse_flexible("garbage").is_none());
        assert!(parse_flexible("").is_none());
    }

    #[test]
    fn formats_app_dates() {
        assert_eq!(format_app_date("2024-03-15"), "03-15-24");
        assert_eq!(format_app_date("not a date"), "not a date");
    }

    #[test]
    fn formats_phone_numbers() {
        assert_eq!(format_phone_number("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone_number("1-555-123-4567"), "(555) 123-4567");
        assert_eq!(format_phone_number("555.123.4567"), "(555) 123-4567");
        // Non-US lengths pass through
        assert_eq!(format_phone_number("12345"), "12345");
        assert_eq!(format_phone_number(""), "");
    }

    #[test]
    fn formats_urls() {
        assert_eq!(format_url("example.com"), "https://example.com");
        assert_eq!(format_url("  example.com "), "https://example.com");
        assert_eq!(format_url("http://example.com"), "http://example.com");
        assert_eq!(format_url("https://example.com"), "https://example.com");
        assert_eq!(format_url(""), "");
    }
}
