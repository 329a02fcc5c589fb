//! Timestamp utilities
//!
//! All timestamps inside the engine are `DateTime<Utc>`. Upstream payloads
//! carry ISO-8601 strings of varying strictness; the database stores a
//! fixed-width RFC 3339 form so that lexical order equals chronological order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an ISO-8601 timestamp leniently.
///
/// Accepts RFC 3339 (`Z` or numeric offset), a space instead of `T`, and
/// naive date-times, which are taken as UTC. A bare date maps to midnight UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse an RFC 2822 timestamp (`Tue, 02 Jan 2024 10:00:00 +0000`)
pub fn parse_rfc2822(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Status callback timestamps arrive in either ISO-8601 or RFC 2822 form.
pub fn parse_flexible(value: &str) -> Option<DateTime<Utc>> {
    parse_iso8601(value).or_else(|| parse_rfc2822(value))
}

/// Format a timestamp for storage.
///
/// Always microsecond precision with a `Z` suffix, so every stored value has
/// the same width.
pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, tolerating rows written by other tools.
pub fn from_storage(value: &str) -> Option<DateTime<Utc>> {
    parse_iso8601(value)
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
