//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::NaiveDate;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash for main.css.
///
/// The hash is computed at build time from the CSS file content.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Formats an ISO date (`2024-01-04`) as `Jan 4, 2024`.
///
/// Values that are not ISO dates are passed through unchanged.
///
/// Usage in templates: `{{ dog.birth_date|format_date }}`
#[askama::filter_fn]
pub fn format_date(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(display_date(&value.to_string()))
}

fn display_date(iso: &str) -> String {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .map_or_else(|_| iso.to_string(), |date| date.format("%b %-d, %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("2024-01-04"), "Jan 4, 2024");
        assert_eq!(display_date("2021-11-30"), "Nov 30, 2021");
    }

    #[test]
    fn test_display_date_passthrough() {
        assert_eq!(display_date("sometime in spring"), "sometime in spring");
    }
}
