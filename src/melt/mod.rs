//! Attendance melting - flatten nested attendance records into relational tables
//!
//! Each attendance record embeds a person, an event and a timeslot. Melting
//! pulls those out into their own tables (deduplicated by identifier) and
//! reduces the attendance itself to scalar columns with foreign keys.
//!
//! ## Pipeline
//!
//! 1. `extractor`: person, event and timeslot rows from one record
//! 2. `attendance`: the flattened attendance row
//! 3. `aggregate`: first-seen-wins dedup across all records
//! 4. `writer`: persist each materialized table

pub mod types;
pub mod timestamp;
pub mod extractor;
pub mod attendance;
pub mod aggregate;
pub mod writer;

pub use types::{EntityId, MeltConfig, ReferrerPolicy, Row, Table, TableKind};
pub use aggregate::{AttendanceMelter, EntityTable, MeltedTables};
pub use writer::{write_tables, CsvDirSink, JsonlDirSink, TableSink};
