//! Entity extractors: pull the embedded person, event and timeslot out of an
//! attendance record and flatten each into a scalar row keyed by its identifier.

use crate::error::{MeltError, Result};
use crate::melt::timestamp::normalize_fields;
use crate::melt::types::{EntityId, Row};
use serde_json::{Map, Value};

pub const PERSON_TIMESTAMPS: [&str; 3] = ["created_date", "modified_date", "blocked_date"];
pub const EVENT_TIMESTAMPS: [&str; 2] = ["created_date", "modified_date"];
pub const TIMESLOT_TIMESTAMPS: [&str; 2] = ["start_date", "end_date"];

/// Multi-value contact categories whose primary entry is promoted to columns
pub const CONTACT_CATEGORIES: [&str; 3] = ["email_addresses", "phone_numbers", "postal_addresses"];

/// Contact sub-fields copied onto the event row as `contact_<field>`
const EVENT_CONTACT_FIELDS: [&str; 3] = ["name", "email_address", "phone_number"];

/// Flattened person row and its identifier
pub fn extract_person(record: &Row) -> Result<(EntityId, Row)> {
    let person = embedded(record, "person")?;
    let key_field = person_key_field(person);
    let id = person
        .get(key_field)
        .and_then(EntityId::from_value)
        .ok_or_else(|| MeltError::missing("person", key_field))?;

    let mut row = Row::new();
    let mut promoted: Vec<(String, Value)> = Vec::new();

    for (key, value) in person {
        // `id` is redundant once the row is keyed by `person_id`
        if key == "id" && key_field == "person_id" {
            continue;
        }
        if CONTACT_CATEGORIES.contains(&key.as_str()) {
            promoted.extend(primary_entry(key, value)?);
            continue;
        }
        row.insert(key.clone(), value.clone());
    }

    normalize_fields(&mut row, &PERSON_TIMESTAMPS)?;
    for (column, value) in promoted {
        if row.contains_key(&column) {
            return Err(MeltError::ColumnClash {
                entity: "person",
                column,
            });
        }
        row.insert(column, value);
    }
    stringify_compound(&mut row);

    Ok((id, row))
}

/// Flattened event row and its identifier
pub fn extract_event(record: &Row) -> Result<(EntityId, Row)> {
    let event = embedded(record, "event")?;
    let id = event
        .get("id")
        .and_then(EntityId::from_value)
        .ok_or_else(|| MeltError::missing("event", "id"))?;

    let mut row = Row::new();
    for (key, value) in event {
        match key.as_str() {
            "id" => {
                row.insert("event_id".to_string(), value.clone());
            }
            "sponsor" | "location" | "contact" => {}
            _ => {
                row.insert(key.clone(), value.clone());
            }
        }
    }

    row.insert("sponsor_id".to_string(), nested(event, "sponsor", "id"));
    row.insert("venue".to_string(), nested(event, "location", "venue"));
    for field in EVENT_CONTACT_FIELDS {
        row.insert(format!("contact_{field}"), nested(event, "contact", field));
    }
    row.insert("owner_user_id".to_string(), nested(event, "contact", "owner_user_id"));

    normalize_fields(&mut row, &EVENT_TIMESTAMPS)?;
    stringify_compound(&mut row);

    Ok((id, row))
}

/// Flattened timeslot row and its identifier
pub fn extract_timeslot(record: &Row) -> Result<(EntityId, Row)> {
    let timeslot = embedded(record, "timeslot")?;
    let id = timeslot
        .get("id")
        .and_then(EntityId::from_value)
        .ok_or_else(|| MeltError::missing("timeslot", "id"))?;

    let mut row: Row = timeslot
        .iter()
        .map(|(key, value)| {
            let key = if key == "id" { "timeslot_id".to_string() } else { key.clone() };
            (key, value.clone())
        })
        .collect();

    normalize_fields(&mut row, &TIMESLOT_TIMESTAMPS)?;
    stringify_compound(&mut row);

    Ok((id, row))
}

/// The field a person is keyed by: `person_id` when present, else `id`
pub(crate) fn person_key_field(person: &Map<String, Value>) -> &'static str {
    match person.get("person_id") {
        Some(value) if !value.is_null() => "person_id",
        _ => "id",
    }
}

/// A mandatory embedded object of an attendance record
fn embedded<'a>(record: &'a Row, field: &'static str) -> Result<&'a Map<String, Value>> {
    record
        .get(field)
        .and_then(Value::as_object)
        .ok_or_else(|| MeltError::missing("attendance", field))
}

/// `obj[outer][inner]`, or null when either level is absent
fn nested(obj: &Map<String, Value>, outer: &str, inner: &str) -> Value {
    obj.get(outer)
        .and_then(Value::as_object)
        .and_then(|o| o.get(inner))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Column contributed by the first entry flagged primary in a category.
///
/// The entry's first non-flag field becomes the column. A missing or null
/// category, or one with no primary entry, contributes nothing.
fn primary_entry(category: &str, entries: &Value) -> Result<Option<(String, Value)>> {
    let entries = match entries {
        Value::Null => return Ok(None),
        Value::Array(entries) => entries,
        _ => return Err(MeltError::missing("person", format!("{category}[]"))),
    };

    let primary = entries
        .iter()
        .filter_map(Value::as_object)
        .find(|entry| entry.get("primary").is_some_and(is_truthy));

    Ok(primary.and_then(|entry| {
        entry
            .iter()
            .find(|(key, _)| key.as_str() != "primary")
            .map(|(key, value)| (key.clone(), value.clone()))
    }))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Replace any remaining object or array column with its compact JSON text
pub(crate) fn stringify_compound(row: &mut Row) {
    for value in row.values_mut() {
        if value.is_object() || value.is_array() {
            *value = Value::String(value.to_string());
        }
    }
}
