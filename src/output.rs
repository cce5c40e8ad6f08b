// Output writers. Everything the client downloads lands in one output
// directory with a minute-resolution timestamp in the file name, the
// naming the service's operators already archive these files under.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;

/// Timestamp component shared by every generated file name.
fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M").to_string()
}

#[derive(Debug, Clone)]
pub struct OutputDir {
    dir: PathBuf,
}

impl OutputDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a downloaded report exactly as received. `kind` is the
    /// report family, e.g. `subscriber` or `transaction`.
    pub fn write_report(&self, kind: &str, body: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{kind}_{}.csv", timestamp()));
        fs::write(&path, body).with_context(|| format!("writing report {}", path.display()))?;
        Ok(path)
    }

    /// Re-encode a batch-status payload (JSON array of objects) as CSV,
    /// column order following the first record's keys. An empty payload
    /// is nothing to write: no file is created.
    pub fn write_batch_status(&self, rows: &[Value]) -> Result<Option<PathBuf>> {
        let Some(first) = rows.first().and_then(Value::as_object) else {
            return Ok(None);
        };
        let columns: Vec<&String> = first.keys().collect();

        let path = self.dir.join(format!("batch_status_{}.csv", timestamp()));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer
            .write_record(columns.iter().map(|column| column.as_str()))
            .context("writing batch-status header")?;
        for row in rows {
            let fields = row.as_object();
            writer
                .write_record(columns.iter().map(|column| {
                    fields
                        .and_then(|fields| fields.get(*column))
                        .map(cell_text)
                        .unwrap_or_default()
                }))
                .context("writing batch-status row")?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        Ok(Some(path))
    }

    /// Append a response body to the rolling API-response log.
    pub fn append_api_response(&self, body: &Value) -> Result<PathBuf> {
        let path = self.dir.join(format!("api_response_{}.json", timestamp()));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let pretty = serde_json::to_string_pretty(body).context("encoding response body")?;
        writeln!(file, "{pretty}").with_context(|| format!("appending to {}", path.display()))?;
        Ok(path)
    }
}

/// CSV cell text for a JSON value: strings verbatim, everything else via
/// its JSON rendering.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_bytes_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = OutputDir::new(dir.path());
        let body = "sac,subscriberId,state\n825010,11,MS\n825010,22,MS\n";

        let path = outputs.write_report("subscriber", body).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("subscriber_") && name.ends_with(".csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), body);
    }

    #[test]
    fn empty_batch_status_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = OutputDir::new(dir.path());

        assert!(outputs.write_batch_status(&[]).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn batch_status_columns_follow_the_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = OutputDir::new(dir.path());
        let rows = vec![
            json!({"batchId": "7", "state": "DONE", "rows": 2}),
            json!({"batchId": "8", "state": "QUEUED", "rows": 5}),
        ];

        let path = outputs.write_batch_status(&rows).unwrap().unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written, "batchId,state,rows\n7,DONE,2\n8,QUEUED,5\n");
    }

    #[test]
    fn response_log_appends_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = OutputDir::new(dir.path());

        let first = outputs.append_api_response(&json!({"status": "ok"})).unwrap();
        let second = outputs
            .append_api_response(&json!({"status": "rejected"}))
            .unwrap();
        assert_eq!(first, second);

        let log = fs::read_to_string(second).unwrap();
        assert!(log.contains("\"status\": \"ok\""));
        assert!(log.contains("\"status\": \"rejected\""));
    }
}
