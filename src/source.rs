//! Record source: load an attendance export into memory
//!
//! Accepts a JSON array of attendances, a single API page (`{"data": [...]}`),
//! or newline-delimited attendance objects.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read every attendance record from a file
pub fn read_attendances_file<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    read_attendances(BufReader::new(file))
        .with_context(|| format!("Failed to read attendances from {}", path.display()))
}

/// Read every attendance record from a reader
pub fn read_attendances<R: Read>(mut reader: R) -> Result<Vec<Value>> {
    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    // simd-json parses in place, so give it a scratch copy for the NDJSON fallback
    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(value) => unwrap_document(value),
        Err(_) => read_ndjson(&content),
    }
}

fn unwrap_document(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut page) => match page.remove("data") {
            Some(Value::Array(records)) => Ok(records),
            Some(_) => bail!("`data` field is not an array of attendances"),
            None => Ok(vec![Value::Object(page)]),
        },
        other => bail!("expected attendance records, found {}", kind_of(&other)),
    }
}

fn read_ndjson(content: &[u8]) -> Result<Vec<Value>> {
    let text = std::str::from_utf8(content).context("Input is not valid UTF-8")?;
    let mut records = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;
        records.push(value);
    }

    Ok(records)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
