// Batch input handling. A batch file is a CSV whose header row uses the
// API's subscriber field names directly (`sac`, `bqpLast4ssn`, ...), one
// subscriber per row. Records are submitted as JSON objects keyed by
// those same names, so field order from the file is preserved.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Field the service wants blanked when the upstream export had no SSN.
pub const SSN_FIELD: &str = "bqpLast4ssn";

/// Export tools emit a literal zero when the last-4-SSN is unknown; the
/// API rejects that unless the field is empty instead.
pub const SSN_PLACEHOLDER: &str = "0";

/// One subscriber row, field order preserved from the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchRecord(pub Map<String, Value>);

impl BatchRecord {
    /// Blank the placeholder last-4-SSN before submission.
    pub fn blank_placeholder_ssn(&mut self) {
        if let Some(value) = self.0.get_mut(SSN_FIELD) {
            if value.as_str() == Some(SSN_PLACEHOLDER) {
                *value = Value::String(String::new());
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

/// Read every record from a batch CSV, in file order.
pub fn read_batch_file(path: &Path) -> Result<Vec<BatchRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening batch file {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("reading header row of {}", path.display()))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("reading batch file {}", path.display()))?;
        let mut fields = Map::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            fields.insert(name.to_string(), Value::String(value.to_string()));
        }
        records.push(BatchRecord(fields));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_batch(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_records_in_file_order() {
        let (_dir, path) =
            write_batch("sac,subscriberId,bqpLast4ssn\n825010,11,6789\n825010,22,4321\n");
        let records = read_batch_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("subscriberId"), Some("11"));
        assert_eq!(records[1].get("subscriberId"), Some("22"));
    }

    #[test]
    fn placeholder_ssn_is_blanked() {
        let (_dir, path) = write_batch("sac,bqpLast4ssn\n825010,0\n825010,6789\n");
        let mut records = read_batch_file(&path).unwrap();
        for record in &mut records {
            record.blank_placeholder_ssn();
        }
        assert_eq!(records[0].get(SSN_FIELD), Some(""));
        assert_eq!(records[1].get(SSN_FIELD), Some("6789"));
    }

    #[test]
    fn serializes_with_header_field_order() {
        let (_dir, path) = write_batch("zeta,alpha,middle\n1,2,3\n");
        let records = read_batch_file(&path).unwrap();
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2","middle":"3"}"#);
    }

    #[test]
    fn header_only_file_yields_no_records() {
        let (_dir, path) = write_batch("sac,subscriberId\n");
        assert!(read_batch_file(&path).unwrap().is_empty());
    }
}
