//! The process-wide structured logging service
//!
//! `CrawlLogger` is constructed once at startup and handed to every component
//! as an `Arc` (dependency injection rather than ambient global state). It
//! owns two sinks, console and rotated file, which fail independently: a
//! sink error is swallowed and degrades output, never propagated, because
//! logging must never crash the pipeline it observes.

use crate::config::LoggingConfig;
use crate::logging::entry::{Component, LogEntry, Severity};
use crate::logging::error_id::{ErrorId, ErrorIdMint};
use crate::logging::rotation::RotatingFileSink;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured logger writing to console and a rotated file sink
pub struct CrawlLogger {
    mint: ErrorIdMint,
    /// Entries below this severity skip the console (the file gets everything)
    console_threshold: Severity,
    /// File sink; `None` when opening failed or a write error degraded the
    /// logger to console-only. The mutex serializes writes so multi-line
    /// error blocks never interleave.
    file: Mutex<Option<RotatingFileSink>>,
}

impl CrawlLogger {
    /// Opens the logger with console and file sinks
    ///
    /// A file sink that cannot be opened (unwritable directory, disk full)
    /// degrades the logger to console-only instead of failing startup.
    pub fn new(config: &LoggingConfig) -> Self {
        Self::with_directory(
            Path::new(&config.directory),
            config.rotation_size_bytes,
            config.retention,
        )
    }

    /// Opens the logger with an explicit log directory
    pub fn with_directory(directory: &Path, rotation_size_bytes: u64, retention: u32) -> Self {
        let file = match RotatingFileSink::open(directory, rotation_size_bytes, retention) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::warn!(
                    "Could not open log file sink in {}: {} (continuing console-only)",
                    directory.display(),
                    e
                );
                None
            }
        };

        Self {
            mint: ErrorIdMint::new(),
            console_threshold: Severity::Info,
            file: Mutex::new(file),
        }
    }

    /// Console-only logger for tests and dry runs
    pub fn console_only() -> Self {
        Self {
            mint: ErrorIdMint::new(),
            console_threshold: Severity::Info,
            file: Mutex::new(None),
        }
    }

    /// Mints a fresh error identifier
    pub fn mint(&self) -> ErrorId {
        self.mint.next()
    }

    /// Writes an entry to every configured sink
    ///
    /// ERROR/CRITICAL entries that arrive without an error identifier get one
    /// minted here, so the invariant "every entry at ERROR or above carries a
    /// non-empty identifier" holds regardless of the caller.
    pub fn log(&self, mut entry: LogEntry) {
        if entry.severity.is_error() && entry.error_id.is_none() {
            entry.error_id = Some(self.mint.next());
        }

        let rendered = entry.render();

        if entry.severity >= self.console_threshold {
            self.write_console(&rendered);
        }

        self.write_file(&rendered);
    }

    /// Logs an ERROR entry and returns its identifier for correlation
    pub fn error(&self, mut entry: LogEntry) -> ErrorId {
        if !entry.severity.is_error() {
            entry.severity = Severity::Error;
        }

        let id = entry
            .error_id
            .clone()
            .unwrap_or_else(|| self.mint.next());
        entry.error_id = Some(id.clone());
        self.log(entry);
        id
    }

    /// Convenience DEBUG entry
    pub fn debug(&self, component: Component, message: impl Into<String>) {
        self.log(LogEntry::new(Severity::Debug, component, message));
    }

    /// Convenience INFO entry
    pub fn info(&self, component: Component, message: impl Into<String>) {
        self.log(LogEntry::new(Severity::Info, component, message));
    }

    /// Convenience WARN entry
    pub fn warn(&self, component: Component, message: impl Into<String>) {
        self.log(LogEntry::new(Severity::Warn, component, message));
    }

    /// Flushes the file sink; called once at shutdown
    pub fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(sink) = guard.as_mut() {
                if let Err(e) = sink.flush() {
                    tracing::warn!("Log file flush failed: {}", e);
                }
            }
        }
    }

    /// Path of the active log file, if the file sink is healthy
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|sink| sink.current_path()))
    }

    fn write_console(&self, rendered: &str) {
        // stdout lock serializes concurrent writers; errors are ignored
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", rendered);
    }

    fn write_file(&self, rendered: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };

        if let Some(sink) = guard.as_mut() {
            if let Err(e) = sink.write_entry(rendered) {
                tracing::warn!(
                    "Log file write failed: {} (degrading to console-only)",
                    e
                );
                *guard = None;
            }
        }
    }
}
