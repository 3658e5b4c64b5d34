//! Output sink for accepted records
//!
//! The sink is append-only: one validated record at a time, prior rows are
//! never rewritten. [`CsvSink`] is the default tabular backend.

mod csv_sink;

pub use csv_sink::CsvSink;

use crate::extract::RawRecord;
use thiserror::Error;

/// Errors that can occur while writing records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write record: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only record sink
pub trait RecordSink: Send {
    /// Appends one validated record
    fn append(&mut self, record: &RawRecord) -> OutputResult<()>;

    /// Flushes buffered rows to the backing store
    fn flush(&mut self) -> OutputResult<()>;
}
