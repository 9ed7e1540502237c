use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One flattened output row, column name to scalar (or null)
pub type Row = Map<String, Value>;

/// Represents a unique identifier for an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    /// Read an identifier out of a JSON value; numbers and strings qualify.
    ///
    /// Identifiers compare by their text, so the number `42` and the string
    /// `"42"` are the same entity.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(EntityId::new(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(EntityId::new(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    People,
    Events,
    Timeslots,
    FlatAttendances,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::People,
        TableKind::Events,
        TableKind::Timeslots,
        TableKind::FlatAttendances,
    ];

    /// File stem used by the sinks
    pub fn name(self) -> &'static str {
        match self {
            TableKind::People => "people",
            TableKind::Events => "events",
            TableKind::Timeslots => "timeslots",
            TableKind::FlatAttendances => "flat_attendances",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A materialized table: every row carries exactly `columns`, in that order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub kind: TableKind,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table whose columns are the union of the rows' keys in first-seen
    /// order. Rows lacking a column get null for it.
    pub fn from_rows(kind: TableKind, rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        {
            let mut seen: HashSet<&str> = HashSet::new();
            for row in &rows {
                for key in row.keys() {
                    if seen.insert(key.as_str()) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|column| {
                        let value = row.get_mut(column).map(Value::take).unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect();

        Table { kind, columns, rows }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What to do when an attendance record has no referrer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferrerPolicy {
    /// A missing referrer is a malformed record
    #[default]
    Required,
    /// A missing referrer yields a null `utm_source`
    Nullable,
}

/// Configuration for the melting process
#[derive(Debug, Clone)]
pub struct MeltConfig {
    /// Log progress every this many records (0 disables progress lines)
    pub progress_interval: usize,

    /// Handling of attendance records without a referrer
    pub referrer_policy: ReferrerPolicy,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            progress_interval: 100,
            referrer_policy: ReferrerPolicy::Required,
        }
    }
}
