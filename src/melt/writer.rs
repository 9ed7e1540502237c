use crate::error::{MeltError, Result};
use crate::melt::aggregate::MeltedTables;
use crate::melt::types::Table;
use serde_json::Value;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Anything that can persist a materialized table
pub trait TableSink {
    fn write_table(&mut self, table: &Table) -> Result<()>;
}

/// Persist every table in order, stopping at the first failure.
///
/// Tables already written before a failure are left in place.
pub fn write_tables<S: TableSink + ?Sized>(sink: &mut S, tables: &MeltedTables) -> Result<()> {
    for table in tables.iter() {
        sink.write_table(table)?;
    }
    Ok(())
}

/// Writes each table to `<dir>/<table>.csv`, replacing any earlier file
pub struct CsvDirSink {
    dir: PathBuf,
}

impl CsvDirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        CsvDirSink {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, table: &Table) -> PathBuf {
        self.dir.join(format!("{}.csv", table.name()))
    }
}

impl TableSink for CsvDirSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let path = self.path_for(table);
        replace_artifact(&self.dir, &path, table)?;

        let mut writer = csv::Writer::from_path(&path).map_err(|e| MeltError::sink(table.name(), e))?;
        writer
            .write_record(&table.columns)
            .map_err(|e| MeltError::sink(table.name(), e))?;

        for row in &table.rows {
            let record = table
                .columns
                .iter()
                .map(|column| cell(row.get(column).unwrap_or(&Value::Null)));
            writer
                .write_record(record.map(|c| c.into_owned()))
                .map_err(|e| MeltError::sink(table.name(), e))?;
        }

        writer.flush().map_err(|e| MeltError::sink(table.name(), e))?;
        info!(table = table.name(), rows = table.len(), path = %path.display(), "wrote table");
        Ok(())
    }
}

/// Writes each table to `<dir>/<table>.jsonl`, one row object per line
pub struct JsonlDirSink {
    dir: PathBuf,
}

impl JsonlDirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        JsonlDirSink {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, table: &Table) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table.name()))
    }
}

impl TableSink for JsonlDirSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let path = self.path_for(table);
        replace_artifact(&self.dir, &path, table)?;

        let file = File::create(&path).map_err(|e| MeltError::sink(table.name(), e))?;
        let mut writer = BufWriter::new(file);
        for row in &table.rows {
            serde_json::to_writer(&mut writer, row).map_err(|e| MeltError::sink(table.name(), e))?;
            writeln!(writer).map_err(|e| MeltError::sink(table.name(), e))?;
        }

        writer.flush().map_err(|e| MeltError::sink(table.name(), e))?;
        info!(table = table.name(), rows = table.len(), path = %path.display(), "wrote table");
        Ok(())
    }
}

/// Remove the previous artifact for a table, then reject empty tables.
///
/// The stale file goes first so an empty run never leaves old rows behind.
fn replace_artifact(dir: &Path, path: &Path, table: &Table) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| MeltError::sink(table.name(), e))?;

    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "deleted stale table"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(MeltError::sink(table.name(), e)),
    }

    if table.is_empty() {
        return Err(MeltError::EmptyTable {
            table: table.name().to_string(),
        });
    }
    Ok(())
}

/// CSV text for a scalar cell; null is an empty cell
fn cell(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melt::types::{Row, TableKind};
    use serde_json::json;

    fn table(kind: TableKind, rows: Value) -> Table {
        let rows: Vec<Row> = serde_json::from_value(rows).unwrap();
        Table::from_rows(kind, rows)
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&json!("text")), "text");
        assert_eq!(cell(&json!(12)), "12");
        assert_eq!(cell(&json!(true)), "true");
        assert_eq!(cell(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvDirSink::new(dir.path());
        let people = table(
            TableKind::People,
            json!([
                {"id": 1, "given_name": "Ada", "email": "ada@example.com"},
                {"id": 2, "given_name": "Grace, H.", "email": null}
            ]),
        );

        sink.write_table(&people).unwrap();

        let written = std::fs::read_to_string(dir.path().join("people.csv")).unwrap();
        assert_eq!(
            written,
            "id,given_name,email\n1,Ada,ada@example.com\n2,\"Grace, H.\",\n"
        );
    }

    #[test]
    fn test_sink_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("events.csv"), "stale,content\n").unwrap();
        let mut sink = CsvDirSink::new(dir.path());

        sink.write_table(&table(TableKind::Events, json!([{"event_id": 42}]))).unwrap();

        let written = std::fs::read_to_string(dir.path().join("events.csv")).unwrap();
        assert_eq!(written, "event_id\n42\n");
    }

    #[test]
    fn test_empty_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("timeslots.csv"), "old\n").unwrap();
        let mut sink = CsvDirSink::new(dir.path());

        let err = sink
            .write_table(&Table::from_rows(TableKind::Timeslots, vec![]))
            .unwrap_err();

        assert!(matches!(err, MeltError::EmptyTable { ref table } if table == "timeslots"));
        assert!(!dir.path().join("timeslots.csv").exists());
    }

    #[test]
    fn test_jsonl_sink_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlDirSink::new(dir.path().join("nested"));

        sink.write_table(&table(
            TableKind::FlatAttendances,
            json!([{"attendance_id": 1, "utm_source": null}, {"attendance_id": 2, "utm_source": "x"}]),
        ))
        .unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("nested").join("flat_attendances.jsonl")).unwrap();
        let lines: Vec<Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, vec![
            json!({"attendance_id": 1, "utm_source": null}),
            json!({"attendance_id": 2, "utm_source": "x"}),
        ]);
    }
}
