use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Renders like `Jan 5, 2025`.
pub const DEFAULT_PATTERN: &str = "%b %-d, %Y";
pub const DEFAULT_FALLBACK: &str = "Invalid date";

/// Formats a stored date value for display, returning `fallback` for anything
/// that is empty or does not parse. Instants with an offset are shown in UTC.
pub fn format_safe_date(value: &Value, pattern: &str, fallback: &str) -> String {
    let Some(dt) = parse_date_value(value) else {
        return fallback.to_string();
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return fallback.to_string();
    }
    let mut out = String::new();
    match write!(out, "{}", dt.format_with_items(items.iter())) {
        Ok(()) => out,
        Err(_) => fallback.to_string(),
    }
}

pub fn parse_date_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::<Utc>::from_timestamp_millis(ms).map(|d| d.naive_utc())
        }
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() || s == "null" || s == "undefined" {
        return None;
    }
    if s.contains('T') || s.contains('-') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
        for fmt in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt);
            }
        }
        // Reduced `YYYY-MM` is the first of the month.
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    ["%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Calendar date of a stored value, for due-date comparisons.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    parse_date_value(value).map(|dt| dt.date())
}
