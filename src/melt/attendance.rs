//! Attendance flattener: reduce the attendance record itself to scalar columns,
//! swapping embedded objects for foreign-key identifiers.

use crate::error::{MeltError, Result};
use crate::melt::extractor::{person_key_field, stringify_compound};
use crate::melt::timestamp::normalize_value;
use crate::melt::types::{EntityId, ReferrerPolicy, Row};
use serde_json::Value;

/// Embedded objects replaced by a `<name>_id` column
pub const FOREIGN_KEYS: [&str; 4] = ["sponsor", "timeslot", "person", "event"];

pub const CUSTOM_FIELDS: &str = "custom_signup_field_values";

/// Flatten one attendance record into its `flat_attendances` row
pub fn flatten_attendance(record: Row, referrer_policy: ReferrerPolicy) -> Result<(EntityId, Row)> {
    let id = record
        .get("id")
        .and_then(EntityId::from_value)
        .ok_or_else(|| MeltError::missing("attendance", "id"))?;

    let mut row = Row::new();
    let mut saw_referrer = false;

    for (key, value) in record {
        match key.as_str() {
            "id" => {
                row.insert("attendance_id".to_string(), value);
            }
            "created_date" | "modified_date" => {
                let normalized = normalize_value(&key, &value)?;
                row.insert(key, normalized);
            }
            "sponsor" | "timeslot" | "person" | "event" => {
                row.insert(format!("{key}_id"), foreign_key(&key, &value));
            }
            "referrer" => {
                saw_referrer = true;
                row.insert("utm_source".to_string(), utm_source(&value, referrer_policy)?);
            }
            CUSTOM_FIELDS => {
                let serialized = match value {
                    Value::Null => Value::Null,
                    other => Value::String(other.to_string()),
                };
                row.insert(key, serialized);
            }
            _ => {
                row.insert(key, value);
            }
        }
    }

    if !saw_referrer {
        row.insert("utm_source".to_string(), utm_source(&Value::Null, referrer_policy)?);
    }
    for name in FOREIGN_KEYS {
        row.entry(format!("{name}_id")).or_insert(Value::Null);
    }
    for field in ["created_date", "modified_date"] {
        row.entry(field).or_insert(Value::Null);
    }
    stringify_compound(&mut row);

    Ok((id, row))
}

/// Identifier of an embedded object, or null when it is absent
fn foreign_key(name: &str, embedded: &Value) -> Value {
    let Some(obj) = embedded.as_object() else {
        return Value::Null;
    };
    let key_field = if name == "person" { person_key_field(obj) } else { "id" };
    obj.get(key_field).cloned().unwrap_or(Value::Null)
}

fn utm_source(referrer: &Value, policy: ReferrerPolicy) -> Result<Value> {
    match (referrer.as_object(), policy) {
        (Some(obj), _) => Ok(obj.get("utm_source").cloned().unwrap_or(Value::Null)),
        (None, ReferrerPolicy::Nullable) => Ok(Value::Null),
        (None, ReferrerPolicy::Required) => Err(MeltError::missing("attendance", "referrer")),
    }
}
