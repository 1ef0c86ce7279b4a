//! Row records and per-type value coercion
//!
//! Rows are plain JSON objects. Every engine reads cell values through the
//! helpers here so that missing keys, nulls and mixed representations are
//! coerced the same way everywhere.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// One record of tabular data
pub type Row = Map<String, Value>;

/// Leading integer of a string, the way `parseInt` reads it
static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("static regex"));

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Build a row from a JSON value, returning `None` for non-objects
pub fn row_from_value(value: Value) -> Option<Row> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// True when the cell is absent or explicitly null
pub fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Plain text of a cell; arrays are joined with `,`
pub fn text(value: Option<&Value>) -> String {
    text_with_separator(value, ",")
}

/// Plain text of a cell, joining array items with `separator`
pub fn text_with_separator(value: Option<&Value>, separator: &str) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .collect::<Vec<_>>()
            .join(separator),
        Some(other @ Value::Object(_)) => other.to_string(),
    }
}

/// Integer value of a cell, truncating any fractional part
///
/// Strings are read up to the first non-digit, so `"26.9kg"` is `26`.
/// Returns `None` when no leading integer exists.
pub fn parse_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int_str(s),
        Value::Array(items) => parse_int(items.first()),
        Value::Null | Value::Bool(_) | Value::Object(_) => None,
    }
}

pub fn parse_int_str(s: &str) -> Option<i64> {
    let caps = LEADING_INT.captures(s)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Floating point value of a cell, `None` when the cell is not numeric
pub fn parse_float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Millisecond timestamp of a date or time cell
///
/// Numbers are taken as milliseconds. Strings may be RFC 3339, a naive
/// date-time, a date, or a bare time of day (milliseconds since midnight).
pub fn parse_timestamp(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }

    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(s, format) {
            let secs = i64::from(time.num_seconds_from_midnight());
            let millis = i64::from(time.nanosecond() / 1_000_000);
            return Some(secs * 1000 + millis);
        }
    }

    None
}

/// Display form of a date timestamp: the date, plus the time when not midnight
pub fn format_date(millis: i64) -> Option<String> {
    let dt = DateTime::from_timestamp_millis(millis)?;
    if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Display form of a time cell; timestamps within one day are times of day
pub fn format_time(millis: i64) -> Option<String> {
    let millis = if (0..MILLIS_PER_DAY).contains(&millis) {
        millis
    } else {
        millis.rem_euclid(MILLIS_PER_DAY)
    };
    let dt = DateTime::from_timestamp_millis(millis)?;
    Some(dt.format("%H:%M:%S").to_string())
}

/// ISO 8601 form used by CSV export
pub fn format_iso(millis: i64) -> Option<String> {
    let dt = DateTime::from_timestamp_millis(millis)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}
