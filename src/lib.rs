//! # Rollcall - Attendance Export Normalizer
//!
//! Melts an event-attendance export (nested person, event, timeslot, sponsor,
//! referrer and custom-field objects per attendance) into four flat tables:
//! people, events, timeslots and flat attendances.
//!
//! ## Modules
//!
//! - **melt**: extraction, flattening, dedup and table sinks
//! - **source**: loading attendance records from disk
//!
//! ## Quick Start
//!
//! ```rust
//! use rollcall::{melt_attendances, MeltConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = vec![json!({
//!     "id": 1,
//!     "created_date": null,
//!     "modified_date": null,
//!     "person": {"id": 7, "email_addresses": [{"primary": true, "address": "a@b.com"}],
//!                "created_date": null, "modified_date": null, "blocked_date": null},
//!     "event": {"id": 42, "sponsor": null, "location": null, "contact": null},
//!     "timeslot": {"id": 9, "start_date": null, "end_date": null},
//!     "sponsor": null,
//!     "referrer": {"utm_source": "email"},
//!     "custom_signup_field_values": []
//! })];
//!
//! let tables = melt_attendances(records, MeltConfig::default())?;
//!
//! assert_eq!(tables.people.rows[0]["address"], "a@b.com");
//! assert_eq!(tables.flat_attendances.rows[0]["event_id"], 42);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub mod error;
pub mod melt;
pub mod source;

// Re-export commonly used types for convenience
pub use error::MeltError;
pub use melt::{
    AttendanceMelter, CsvDirSink, EntityId, JsonlDirSink, MeltConfig, MeltedTables, ReferrerPolicy,
    Row, Table, TableKind, TableSink,
};

/// Core entry point: melt an in-memory record collection into the four tables
pub fn melt_attendances(records: Vec<Value>, config: MeltConfig) -> error::Result<MeltedTables> {
    AttendanceMelter::new(config).melt(records)
}

/// Read an attendance export, melt it, and hand every table to `sink`
pub fn melt_file<P, S>(input: P, sink: &mut S, config: MeltConfig) -> Result<MeltedTables>
where
    P: AsRef<Path>,
    S: TableSink + ?Sized,
{
    let records = source::read_attendances_file(&input)?;
    info!(records = records.len(), "processed attendances");

    let tables = melt_attendances(records, config).context("Failed to melt attendances")?;
    melt::write_tables(sink, &tables).context("Failed to write tables")?;

    Ok(tables)
}
