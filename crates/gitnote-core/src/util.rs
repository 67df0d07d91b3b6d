//! Shared utility functions used across multiple modules.

use chrono::{DateTime, SecondsFormat, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current UTC time as a fixed-width ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns `true` when `candidate` is strictly later than `reference`.
///
/// Both values are parsed as RFC 3339 timestamps and compared as absolute
/// instants, so mixed offsets and precisions order correctly. When either side
/// does not parse, the raw strings are compared lexically, which is correct for
/// fixed-width UTC values.
pub fn is_newer(candidate: &str, reference: &str) -> bool {
    match (parse_timestamp(candidate), parse_timestamp(reference)) {
        (Some(candidate), Some(reference)) => candidate > reference,
        _ => candidate > reference,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
