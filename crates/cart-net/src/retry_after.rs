//! Retry-After extraction.
//!
//! Rate-limited endpoints signal the wait interval three ways: a
//! `Retry-After` header, a `retryAfter` field in the JSON body, or the
//! phrase `retry after N seconds` in an error message. Absent all three,
//! callers fall back to one second.

use std::time::Duration;

use serde_json::Value;

/// Default back-off when no Retry-After signal is present.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Extracts the retry interval from a response's header and body.
pub fn retry_after_from(header: Option<&str>, body: &str) -> Duration {
    if let Some(seconds) = header.and_then(|value| value.trim().parse::<u64>().ok()) {
        return Duration::from_secs(seconds);
    }

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(seconds) = find_retry_after_field(&json) {
            return Duration::from_secs(seconds);
        }
        if let Some(message) = json
            .pointer("/error/message")
            .and_then(Value::as_str)
        {
            if let Some(seconds) = parse_retry_after_text(message) {
                return Duration::from_secs(seconds);
            }
        }
    }

    if let Some(seconds) = parse_retry_after_text(body) {
        return Duration::from_secs(seconds);
    }

    DEFAULT_RETRY_AFTER
}

fn find_retry_after_field(json: &Value) -> Option<u64> {
    for pointer in [
        "/retryAfter",
        "/retry_after_seconds",
        "/error/data/retry_after_seconds",
    ] {
        if let Some(seconds) = json.pointer(pointer).and_then(Value::as_u64) {
            return Some(seconds);
        }
    }
    None
}

/// Parses `retry after N seconds` out of free-form error text.
fn parse_retry_after_text(text: &str) -> Option<u64> {
    let lower = text.to_ascii_lowercase();
    let tail = &lower[lower.find("retry after")? + "retry after".len()..];
    let tail = tail.trim_start();
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
