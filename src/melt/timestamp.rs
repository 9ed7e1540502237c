//! Epoch-to-string conversion for timestamp columns
//!
//! Upstream timestamps are Unix epochs in seconds. They are rendered in the
//! local time zone as `YYYY-MM-DD HH:MM:SS`; absent or falsy values become null.

use crate::error::{MeltError, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render an epoch as a local date-time string.
///
/// Returns `None` for an absent or zero epoch, and for epochs chrono cannot
/// represent.
pub fn normalize_epoch(epoch: Option<i64>) -> Option<String> {
    match epoch {
        None | Some(0) => None,
        Some(secs) => format_epoch(secs),
    }
}

fn format_epoch(secs: i64) -> Option<String> {
    Local
        .timestamp_opt(secs, 0)
        .earliest()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Parse a rendered timestamp back into an epoch
pub fn parse_timestamp(rendered: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(rendered, TIMESTAMP_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Normalize a raw JSON timestamp value.
///
/// Falsy values (null, `false`, numeric zero, `""`, empty collections) map to
/// null. Anything else must coerce to an integer epoch or the call fails; a
/// truthy value that truncates to zero (`"0"`, `0.5`) renders as the epoch.
pub fn normalize_value(field: &str, value: &Value) -> Result<Value> {
    let conversion_error = || MeltError::Conversion {
        field: field.to_string(),
        value: value.clone(),
    };

    let epoch = match value {
        Value::Null | Value::Bool(false) => return Ok(Value::Null),
        Value::Array(items) if items.is_empty() => return Ok(Value::Null),
        Value::Object(obj) if obj.is_empty() => return Ok(Value::Null),
        Value::String(s) if s.is_empty() => return Ok(Value::Null),
        Value::Number(n) if n.as_f64() == Some(0.0) => return Ok(Value::Null),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
                    _ => return Err(conversion_error()),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| conversion_error())?,
        _ => return Err(conversion_error()),
    };

    format_epoch(epoch)
        .map(Value::String)
        .ok_or_else(conversion_error)
}

/// Normalize the named timestamp columns of a row in place.
///
/// A column that is missing from the row is filled with null.
pub fn normalize_fields(row: &mut Map<String, Value>, fields: &[&str]) -> Result<()> {
    for field in fields {
        let normalized = match row.get(*field) {
            Some(value) => normalize_value(field, value)?,
            None => Value::Null,
        };
        row.insert((*field).to_string(), normalized);
    }
    Ok(())
}
