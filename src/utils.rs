//! Utility functions for timestamps, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - ISO-8601 timestamps and lenient date normalization for persistence
//! - String truncation for logging model output
//! - JSON error detection for spotting truncated model responses
//! - File system validation for the database location

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Offset-less date-time formats, read as UTC.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Date-only formats accepted when normalizing a model-reported date.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Current UTC time as an ISO-8601 string with millisecond precision.
///
/// This is the timestamp substituted whenever an article carries no date.
///
/// # Examples
///
/// ```ignore
/// let now = now_iso(); // e.g. "2025-05-06T14:30:00.123Z"
/// ```
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a free-form date string into RFC 3339.
///
/// Full timestamps (RFC 3339, RFC 2822, or ISO-8601 without an offset, read
/// as UTC) are converted to UTC, date-only values are
/// placed at midnight UTC. Anything unparseable becomes `fallback`.
///
/// # Arguments
///
/// * `raw` - The date as reported by the model
/// * `fallback` - The timestamp to use when `raw` cannot be parsed
pub fn normalize_date(raw: &str, fallback: DateTime<Utc>) -> String {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
            }
        }
    }

    debug!(raw, "Unparseable article date; using fallback");
    fallback.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Return at most the first `max` characters of `s`.
pub fn take_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let head = take_chars(s, max);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the model's answer is cut off (e.g., due to token limits), the
/// resulting JSON fails to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure the directory holding `path` exists and is writable.
///
/// Creates the parent directory if needed, then performs a write test by
/// creating and immediately deleting a probe file next to `path`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_parent_dir(path: &str) -> Result<(), Box<dyn Error>> {
    let parent = match Path::new(path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&parent).await?;

    let probe_path = parent.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %parent.display(), "Database directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "€€€€";
        assert_eq!(truncate_for_log(s, 2), "€€…(+6 bytes)");
    }

    #[test]
    fn test_take_chars() {
        assert_eq!(take_chars("abcdef", 3), "abc");
        assert_eq!(take_chars("ab", 3), "ab");
        assert_eq!(take_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_now_iso_shape() {
        let now = now_iso();
        assert!(now.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&now).is_ok());
    }

    #[test]
    fn test_normalize_date_rfc3339() {
        assert_eq!(
            normalize_date("2025-05-06T10:00:00+08:00", fallback()),
            "2025-05-06T02:00:00.000Z"
        );
    }

    #[test]
    fn test_normalize_date_rfc2822() {
        assert_eq!(
            normalize_date("Tue, 06 May 2025 10:00:00 GMT", fallback()),
            "2025-05-06T10:00:00.000Z"
        );
        assert_eq!(
            normalize_date("Tue, 06 May 2025 10:00:00 +0800", fallback()),
            "2025-05-06T02:00:00.000Z"
        );
    }

    #[test]
    fn test_normalize_date_without_offset_is_utc() {
        assert_eq!(
            normalize_date("2025-05-06T10:00:00", fallback()),
            "2025-05-06T10:00:00.000Z"
        );
        assert_eq!(
            normalize_date("2025-05-06 10:00:00", fallback()),
            "2025-05-06T10:00:00.000Z"
        );
        assert_eq!(
            normalize_date("2025-05-06T10:00:00.250", fallback()),
            "2025-05-06T10:00:00.250Z"
        );
        assert_eq!(
            normalize_date("2025-05-06 10:00:00.5", fallback()),
            "2025-05-06T10:00:00.500Z"
        );
    }

    #[test]
    fn test_normalize_date_plain_formats() {
        assert_eq!(
            normalize_date("2024-01-15", fallback()),
            "2024-01-15T00:00:00.000Z"
        );
        assert_eq!(
            normalize_date("January 15, 2024", fallback()),
            "2024-01-15T00:00:00.000Z"
        );
        assert_eq!(
            normalize_date("15 Jan 2024", fallback()),
            "2024-01-15T00:00:00.000Z"
        );
    }

    #[test]
    fn test_normalize_date_garbage_uses_fallback() {
        assert_eq!(
            normalize_date("last Tuesday", fallback()),
            "2025-01-01T12:00:00.000Z"
        );
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"[{"title": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        let err = result.unwrap_err();
        assert!(looks_truncated(&err));
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("property_news_{}", std::process::id()));
        let db = dir.join("nested").join("news.db");
        ensure_parent_dir(db.to_str().unwrap()).await.unwrap();
        assert!(dir.join("nested").is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
