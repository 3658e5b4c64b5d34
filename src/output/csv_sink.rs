//! CSV record sink
//!
//! Writes a header row from the configured schema once, then one row per
//! accepted record. List values are joined with `|`; everything is UTF-8 so
//! non-Latin field content survives the round trip.

use crate::extract::RawRecord;
use crate::output::{OutputError, OutputResult, RecordSink};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only CSV writer over the configured column list
pub struct CsvSink {
    writer: BufWriter<File>,
    columns: Vec<String>,
}

impl CsvSink {
    /// Creates the file (truncating any previous run) and writes the header
    pub fn create(path: &Path, columns: Vec<String>) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let header: Vec<String> = columns.iter().map(|c| escape_field(c)).collect();
        writeln!(writer, "{}", header.join(","))?;

        Ok(Self { writer, columns })
    }

    fn render_value(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Self::render_value)
                .collect::<Vec<_>>()
                .join("|"),
            other => other.to_string(),
        }
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &RawRecord) -> OutputResult<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let rendered = record
                    .get(column)
                    .map(Self::render_value)
                    .unwrap_or_default();
                escape_field(&rendered)
            })
            .collect();

        writeln!(self.writer, "{}", row.join(","))
            .map_err(|e| OutputError::Write(e.to_string()))?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Quotes a field when it contains a delimiter, quote or newline
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
