use rollcall::{melt_file, CsvDirSink, JsonlDirSink, MeltConfig, MeltError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn attendance(id: u64, person: u64, event: u64) -> Value {
    json!({
        "id": id,
        "created_date": 1_546_300_800,
        "modified_date": 1_546_300_900,
        "person": {
            "id": person,
            "given_name": "Ada",
            "family_name": "Lovelace",
            "email_addresses": [
                {"primary": false, "address": "old@example.com"},
                {"primary": true, "address": format!("p{person}@example.com")}
            ],
            "phone_numbers": [{"primary": true, "number": "555-0100"}],
            "postal_addresses": [],
            "created_date": 1_500_000_000,
            "modified_date": null,
            "blocked_date": null
        },
        "event": {
            "id": event,
            "title": "Phone bank",
            "sponsor": {"id": 12, "name": "Local Org"},
            "location": {"venue": "Library", "locality": "Springfield"},
            "contact": {"name": "Sam", "email_address": null, "phone_number": "555-0199", "owner_user_id": 4},
            "created_date": 1_540_000_000,
            "modified_date": 0
        },
        "timeslot": {"id": 300 + event, "start_date": 1_546_400_000, "end_date": 1_546_410_800},
        "sponsor": {"id": 12, "name": "Local Org"},
        "referrer": {"utm_source": "facebook", "url": "https://example.com/e"},
        "custom_signup_field_values": [{"custom_field_id": 5, "boolean_value": true}]
    })
}

fn write_input(dir: &Path, records: &[Value]) -> std::path::PathBuf {
    let path = dir.join("attendances.json");
    fs::write(&path, serde_json::to_vec(records).unwrap()).unwrap();
    path
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<HashMap<String, String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect()
        })
        .collect();
    (headers, rows)
}

#[test]
fn csv_tables_written_for_export() {
    let dir = tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[attendance(1, 10, 42), attendance(2, 11, 42), attendance(3, 10, 43)],
    );
    let output = dir.path().join("output");

    let tables = melt_file(&input, &mut CsvDirSink::new(&output), MeltConfig::default()).unwrap();
    assert_eq!(tables.people.len(), 2);
    assert_eq!(tables.events.len(), 2);

    let (headers, people) = read_csv(&output.join("people.csv"));
    assert!(headers.contains(&"address".to_string()));
    assert!(headers.contains(&"number".to_string()));
    assert!(!headers.contains(&"email_addresses".to_string()));
    assert_eq!(people.len(), 2);
    assert_eq!(people[0]["address"], "p10@example.com");
    assert_eq!(people[0]["modified_date"], "");

    let (_, events) = read_csv(&output.join("events.csv"));
    let event_ids: Vec<&str> = events.iter().map(|e| e["event_id"].as_str()).collect();
    assert_eq!(event_ids, vec!["42", "43"]);
    assert_eq!(events[0]["venue"], "Library");
    assert_eq!(events[0]["sponsor_id"], "12");
    assert_eq!(events[0]["contact_email_address"], "");
    assert_eq!(events[0]["owner_user_id"], "4");
    assert_eq!(events[0]["modified_date"], "");

    let (_, timeslots) = read_csv(&output.join("timeslots.csv"));
    assert_eq!(timeslots.len(), 2);
    assert_eq!(timeslots[0]["start_date"].len(), 19);

    let (headers, attendances) = read_csv(&output.join("flat_attendances.csv"));
    for column in ["attendance_id", "person_id", "event_id", "timeslot_id", "sponsor_id", "utm_source"] {
        assert!(headers.contains(&column.to_string()), "missing column {column}");
    }
    assert_eq!(attendances.len(), 3);
    assert_eq!(attendances[2]["person_id"], "10");
    assert_eq!(attendances[2]["utm_source"], "facebook");
    let custom: Value = serde_json::from_str(&attendances[0]["custom_signup_field_values"]).unwrap();
    assert_eq!(custom, json!([{"custom_field_id": 5, "boolean_value": true}]));
}

#[test]
fn rerun_replaces_tables_with_identical_output() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path(), &[attendance(1, 10, 42), attendance(2, 11, 43)]);
    let output = dir.path().join("output");

    melt_file(&input, &mut CsvDirSink::new(&output), MeltConfig::default()).unwrap();
    let first = fs::read_to_string(output.join("flat_attendances.csv")).unwrap();
    melt_file(&input, &mut CsvDirSink::new(&output), MeltConfig::default()).unwrap();
    let second = fs::read_to_string(output.join("flat_attendances.csv")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn missing_referrer_aborts_run() {
    let dir = tempdir().unwrap();
    let mut broken = attendance(2, 11, 42);
    broken.as_object_mut().unwrap().remove("referrer");
    let input = write_input(dir.path(), &[attendance(1, 10, 42), broken]);
    let output = dir.path().join("output");

    let err = melt_file(&input, &mut CsvDirSink::new(&output), MeltConfig::default()).unwrap_err();

    let melt_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<MeltError>())
        .expect("melt error in chain");
    assert!(matches!(melt_err, MeltError::InRecord { index: 1, .. }));
    assert!(matches!(melt_err.root(), MeltError::MalformedRecord { field, .. } if field == "referrer"));
    assert!(!output.join("people.csv").exists());
}

#[test]
fn empty_export_reports_empty_table() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path(), &[]);
    let output = dir.path().join("output");

    let err = melt_file(&input, &mut CsvDirSink::new(&output), MeltConfig::default()).unwrap_err();

    let melt_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<MeltError>())
        .expect("melt error in chain");
    assert!(matches!(melt_err, MeltError::EmptyTable { table } if table == "people"));
}

#[test]
fn jsonl_tables_written_for_ndjson_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("attendances.jsonl");
    let lines: Vec<String> = [attendance(1, 10, 42), attendance(2, 10, 42)]
        .iter()
        .map(|record| record.to_string())
        .collect();
    fs::write(&input, lines.join("\n")).unwrap();
    let output = dir.path().join("output");

    melt_file(&input, &mut JsonlDirSink::new(&output), MeltConfig::default()).unwrap();

    let people = fs::read_to_string(output.join("people.jsonl")).unwrap();
    assert_eq!(people.lines().count(), 1);
    let attendances = fs::read_to_string(output.join("flat_attendances.jsonl")).unwrap();
    assert_eq!(attendances.lines().count(), 2);
    let first: Value = serde_json::from_str(attendances.lines().next().unwrap()).unwrap();
    assert_eq!(first["event_id"], json!(42));
}
