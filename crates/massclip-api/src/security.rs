//! Input validation and sanitization.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use tracing::warn;
use url::Url;

use massclip_stripe::DateOfBirth;

const MAX_URL_LENGTH: usize = 2048;

pub const MAX_TITLE_LENGTH: usize = 200;

pub const MAX_DESCRIPTION_LENGTH: usize = 5000;

/// Hosts a stored file URL must never point at.
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://127\.",
        r"^https?://localhost",
        r"^https?://10\.",
        r"^https?://172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^https?://192\.168\.",
        r"^https?://169\.254\.",
        r"^https?://\[::1\]",
        r"^https?://\[fd",
        r"^https?://\[fe80",
        r"^https?://metadata\.",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static SSN_LAST_4: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").expect("valid regex"));

/// Check that a client-supplied file URL is a public http(s) location.
pub fn validate_file_url(url: &str) -> Result<String, String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("fileUrl is required".to_string());
    }
    if url.len() > MAX_URL_LENGTH {
        return Err(format!("fileUrl exceeds {} characters", MAX_URL_LENGTH));
    }

    let parsed = Url::parse(url).map_err(|e| format!("Invalid fileUrl: {}", e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("Unsupported fileUrl scheme '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none() {
        return Err("fileUrl must have a host".to_string());
    }
    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(url)) {
        warn!(url = %url, "Rejected file URL pointing at an internal host");
        return Err("fileUrl points at an internal address".to_string());
    }

    Ok(url.to_string())
}

/// Trim and truncate a title.
pub fn sanitize_title(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_TITLE_LENGTH)
        .collect()
}

/// Strip control characters (except newlines and tabs) and truncate.
pub fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_DESCRIPTION_LENGTH)
        .collect()
}

/// Document ids come from path segments; keep them to a safe alphabet.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn is_valid_ssn_last_4(value: &str) -> bool {
    SSN_LAST_4.is_match(value)
}

/// A real calendar date, in the past, for someone at least 13 years old.
pub fn is_valid_date_of_birth(dob: &DateOfBirth) -> bool {
    let Some(date) = NaiveDate::from_ymd_opt(dob.year as i32, dob.month, dob.day) else {
        return false;
    };
    let today = Utc::now().date_naive();
    date.year() >= 1900 && today.years_since(date).is_some_and(|age| age >= 13)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_validation() {
        assert!(validate_file_url("https://cdn.massclip.test/uploads/u1/a.mp4").is_ok());
        assert!(validate_file_url("").is_err());
        assert!(validate_file_url("ftp://cdn.massclip.test/a.mp4").is_err());
        assert!(validate_file_url("http://169.254.169.254/latest/meta-data/").is_err());
        assert!(validate_file_url("http://localhost:9000/a.mp4").is_err());
    }

    #[test]
    fn test_title_sanitization() {
        assert_eq!(sanitize_title("  Pack \u{7} "), "Pack");
        assert_eq!(sanitize_title(&"x".repeat(500)).len(), MAX_TITLE_LENGTH);
    }

    #[test]
    fn test_document_id_validation() {
        assert!(is_valid_document_id("9f86d081884c7d65"));
        assert!(is_valid_document_id("cs_test_a1B2"));
        assert!(!is_valid_document_id("a/b"));
        assert!(!is_valid_document_id(".."));
        assert!(!is_valid_document_id(""));
    }

    #[test]
    fn test_identity_field_validation() {
        assert!(is_valid_ssn_last_4("1234"));
        assert!(!is_valid_ssn_last_4("12a4"));
        assert!(!is_valid_ssn_last_4("12345"));

        assert!(is_valid_date_of_birth(&DateOfBirth { day: 15, month: 6, year: 1990 }));
        assert!(!is_valid_date_of_birth(&DateOfBirth { day: 31, month: 2, year: 1990 }));
        assert!(!is_valid_date_of_birth(&DateOfBirth { day: 1, month: 1, year: 2099 }));
    }
}
