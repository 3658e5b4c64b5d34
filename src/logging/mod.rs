//! Structured logging for the extraction pipeline
//!
//! This module is the single point of truth for diagnostic output:
//! - Fixed-layout entries tagged with severity and originating component
//! - Unique error identifiers correlating all log lines about one failure
//! - Console plus size/day-rotated file sinks that fail independently
//!
//! Logger failures are swallowed, never propagated; a broken file sink
//! degrades the service to console-only output.

mod entry;
mod error_id;
mod logger;
mod rotation;

pub use entry::{Component, LogEntry, Severity};
pub use error_id::{ErrorId, ErrorIdMint};
pub use logger::CrawlLogger;
pub use rotation::RotatingFileSink;
