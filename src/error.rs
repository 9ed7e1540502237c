use serde_json::Value;
use thiserror::Error;

/// Errors raised while melting attendance records into tables
#[derive(Debug, Error)]
pub enum MeltError {
    /// A nested object or field the attendance schema treats as mandatory is absent
    #[error("malformed {entity} record: missing `{field}`")]
    MalformedRecord { entity: &'static str, field: String },

    /// A promoted primary-entry field would overwrite a column already on the row
    #[error("malformed {entity} record: primary entry field `{column}` clashes with an existing column")]
    ColumnClash { entity: &'static str, column: String },

    /// A timestamp field holds a truthy value that is not an epoch integer
    #[error("cannot convert `{field}` value {value} to a timestamp")]
    Conversion { field: String, value: Value },

    /// A table has no rows, so there is nothing to infer its columns from
    #[error("table `{table}` has no rows to write")]
    EmptyTable { table: String },

    /// The sink could not persist a table
    #[error("failed to write table `{table}`: {source}")]
    SinkWrite {
        table: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any of the above, tagged with the position of the offending attendance record
    #[error("attendance record #{index}: {source}")]
    InRecord {
        index: usize,
        #[source]
        source: Box<MeltError>,
    },
}

impl MeltError {
    pub(crate) fn missing(entity: &'static str, field: impl Into<String>) -> Self {
        MeltError::MalformedRecord {
            entity,
            field: field.into(),
        }
    }

    pub(crate) fn sink(
        table: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MeltError::SinkWrite {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// The underlying error, with any record position stripped
    pub fn root(&self) -> &MeltError {
        match self {
            MeltError::InRecord { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeltError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_record_position() {
        let err = MeltError::InRecord {
            index: 3,
            source: Box::new(MeltError::missing("attendance", "referrer")),
        };

        assert!(matches!(
            err.root(),
            MeltError::MalformedRecord { entity: "attendance", field } if field == "referrer"
        ));
        assert_eq!(
            err.to_string(),
            "attendance record #3: malformed attendance record: missing `referrer`"
        );
    }
}
