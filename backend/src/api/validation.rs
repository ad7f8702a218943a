//! Shared input validation helpers.
//!
//! URL, poster and date/time parsing rules used by the event handlers and
//! services so that form rules are defined in one place.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{AppError, Result};

pub const POSTER_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Validate that a URL is an absolute http(s) link with a host.
///
/// `label` is used in error messages (e.g. "Meeting URL").
pub fn validate_http_url(url_str: &str, label: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {}", label)))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(AppError::Validation(format!(
            "{} must use http or https",
            label
        )));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::Validation(format!("{} must have a host", label)));
    }

    Ok(())
}

/// A poster reference must end in an image extension (query strings ignored).
pub fn validate_poster_url(poster: &str) -> Result<()> {
    let path = poster.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if POSTER_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Poster must be a JPG, PNG, or WEBP image".to_string(),
        ))
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str, label: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid {} (expected YYYY-MM-DD)", label)))
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str, label: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(format!("Invalid {} (expected HH:MM)", label)))
}

/// Parse an optional query-string date; blank means absent.
pub fn parse_optional_date(raw: Option<&str>, label: &str) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date(value, label).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_https_meeting_link() {
        assert!(validate_http_url("https://meet.example.com/abc-def", "Meeting URL").is_ok());
    }

    #[test]
    fn test_allows_http_with_port() {
        assert!(validate_http_url("http://zoom.example.com:8080/j/1", "Meeting URL").is_ok());
    }

    #[test]
    fn test_rejects_ftp_scheme() {
        assert!(validate_http_url("ftp://files.example.com", "Meeting URL").is_err());
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(validate_http_url("not a url", "Meeting URL").is_err());
    }

    #[test]
    fn test_label_appears_in_error_message() {
        let err = validate_http_url("mailto:someone@example.com", "Meeting URL").unwrap_err();
        assert!(err.to_string().contains("Meeting URL"));
    }

    #[test]
    fn test_poster_extensions() {
        assert!(validate_poster_url("uploads/poster.PNG").is_ok());
        assert!(validate_poster_url("https://cdn.example.com/p.webp?v=2").is_ok());
        assert!(validate_poster_url("poster.jpeg").is_ok());
        assert!(validate_poster_url("poster.gif").is_err());
        assert!(validate_poster_url("poster").is_err());
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(
            parse_time("09:30", "start time").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time("09:30:15", "start time").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 15).unwrap()
        );
        assert!(parse_time("9.30", "start time").is_err());
    }

    #[test]
    fn test_optional_date_blank_is_none() {
        assert_eq!(parse_optional_date(Some("  "), "from").unwrap(), None);
        assert_eq!(parse_optional_date(None, "from").unwrap(), None);
        assert!(parse_optional_date(Some("2026-13-01"), "from").is_err());
    }
}
