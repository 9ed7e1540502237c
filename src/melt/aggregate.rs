//! Dedup aggregation across the whole record collection
//!
//! Each output table is an arena of rows plus an identifier index. The first
//! row seen for an identifier is kept; later duplicates are dropped, so
//! materialization order is the first-seen order of identifiers.

use crate::error::{MeltError, Result};
use crate::melt::attendance::flatten_attendance;
use crate::melt::extractor::{extract_event, extract_person, extract_timeslot};
use crate::melt::types::{EntityId, MeltConfig, Row, Table, TableKind};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Identifier-keyed rows for one table, first write wins
#[derive(Debug, Default)]
pub struct EntityTable {
    index: HashMap<EntityId, usize>,
    rows: Vec<Row>,
}

impl EntityTable {
    /// Insert a row unless its identifier is already present.
    /// Returns whether the row was kept.
    pub fn insert(&mut self, id: EntityId, row: Row) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn get(&self, id: &EntityId) -> Option<&Row> {
        self.index.get(id).map(|&slot| &self.rows[slot])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_table(self, kind: TableKind) -> Table {
        Table::from_rows(kind, self.rows)
    }
}

/// The four normalized tables produced by one run
#[derive(Debug, Clone, PartialEq)]
pub struct MeltedTables {
    pub people: Table,
    pub events: Table,
    pub timeslots: Table,
    pub flat_attendances: Table,
}

impl MeltedTables {
    pub fn get(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::People => &self.people,
            TableKind::Events => &self.events,
            TableKind::Timeslots => &self.timeslots,
            TableKind::FlatAttendances => &self.flat_attendances,
        }
    }

    /// Tables in the order they are persisted
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        TableKind::ALL.into_iter().map(|kind| self.get(kind))
    }
}

/// Drives extraction over attendance records and deduplicates the results
pub struct AttendanceMelter {
    config: MeltConfig,
    people: EntityTable,
    events: EntityTable,
    timeslots: EntityTable,
    attendances: EntityTable,
    processed: usize,
}

impl AttendanceMelter {
    pub fn new(config: MeltConfig) -> Self {
        AttendanceMelter {
            config,
            people: EntityTable::default(),
            events: EntityTable::default(),
            timeslots: EntityTable::default(),
            attendances: EntityTable::default(),
            processed: 0,
        }
    }

    /// Melt a full record collection into the four tables
    pub fn melt(mut self, records: Vec<Value>) -> Result<MeltedTables> {
        let total = records.len();
        info!(records = total, "starting to process attendance records");

        for record in records {
            self.push(record)?;
            let done = self.processed;
            if self.config.progress_interval > 0 && done % self.config.progress_interval == 0 {
                info!(processed = done, total, "melt progress");
            }
        }

        Ok(self.finish())
    }

    /// Extract one record into the accumulators.
    ///
    /// Errors are tagged with the zero-based position of the record.
    pub fn push(&mut self, record: Value) -> Result<()> {
        let index = self.processed;
        self.push_record(record).map_err(|source| MeltError::InRecord {
            index,
            source: Box::new(source),
        })?;
        self.processed += 1;
        Ok(())
    }

    fn push_record(&mut self, record: Value) -> Result<()> {
        let Value::Object(record) = record else {
            return Err(MeltError::missing("attendance", "object"));
        };

        // Extract everything before inserting so a failing record leaves no partial rows
        let (person_id, person) = extract_person(&record)?;
        let (event_id, event) = extract_event(&record)?;
        let (timeslot_id, timeslot) = extract_timeslot(&record)?;
        let (attendance_id, attendance) = flatten_attendance(record, self.config.referrer_policy)?;

        if !self.people.insert(person_id.clone(), person) {
            debug!(%person_id, "duplicate person, keeping first row");
        }
        if !self.events.insert(event_id.clone(), event) {
            debug!(%event_id, "duplicate event, keeping first row");
        }
        if !self.timeslots.insert(timeslot_id.clone(), timeslot) {
            debug!(%timeslot_id, "duplicate timeslot, keeping first row");
        }
        if !self.attendances.insert(attendance_id.clone(), attendance) {
            debug!(%attendance_id, "duplicate attendance, keeping first row");
        }

        Ok(())
    }

    /// Number of records extracted so far
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Materialize the accumulators into tables
    pub fn finish(self) -> MeltedTables {
        info!(
            records = self.processed,
            people = self.people.len(),
            events = self.events.len(),
            timeslots = self.timeslots.len(),
            attendances = self.attendances.len(),
            "converted attendance records"
        );

        MeltedTables {
            people: self.people.into_table(TableKind::People),
            events: self.events.into_table(TableKind::Events),
            timeslots: self.timeslots.into_table(TableKind::Timeslots),
            flat_attendances: self.attendances.into_table(TableKind::FlatAttendances),
        }
    }
}
