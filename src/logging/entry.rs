//! Log entry types and line formatting
//!
//! A `LogEntry` is immutable once built and is written exactly once to each
//! configured sink. Formatting is fixed-layout so entries stay grep-able:
//! single line for DEBUG/INFO/WARN, with a delimited error block appended for
//! ERROR/CRITICAL.

use crate::logging::error_id::ErrorId;
use chrono::{DateTime, Utc};
use std::fmt;

/// Delimiter line for the error block of ERROR/CRITICAL entries
const ERROR_BLOCK_DELIMITER: &str = "=====================================";

/// Entry severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// True for ERROR and CRITICAL, the severities that carry an error block
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage a log entry originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Fetch,
    Extract,
    Validate,
    System,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "FETCH",
            Self::Extract => "EXTRACT",
            Self::Validate => "VALIDATE",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub component: Component,
    pub message: String,
    /// Correlation identifier; required for ERROR and above
    pub error_id: Option<ErrorId>,
    /// Ordered key/value context pairs, rendered inline
    pub context: Vec<(String, String)>,
    /// Underlying error message, rendered in the error block
    pub cause: Option<String>,
    /// Stack trace or failure chain text, indented in the error block
    pub trace: Option<String>,
}

impl LogEntry {
    pub fn new(severity: Severity, component: Component, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            component,
            message: message.into(),
            error_id: None,
            context: Vec::new(),
            cause: None,
            trace: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    pub fn with_error_id(mut self, id: ErrorId) -> Self {
        self.error_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Renders the entry into its fixed wire layout
    ///
    /// `[TIMESTAMP] [LEVEL] [COMPONENT] Message | key: value | key: value`
    /// followed, for ERROR/CRITICAL, by the delimited block carrying the
    /// error identifier, underlying message and indented trace.
    pub fn render(&self) -> String {
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.severity,
            self.component,
            self.message
        );

        for (key, value) in &self.context {
            line.push_str(&format!(" | {}: {}", key, value));
        }

        if !self.severity.is_error() {
            return line;
        }

        let mut sections = vec![line, ERROR_BLOCK_DELIMITER.to_string()];

        if let Some(id) = &self.error_id {
            sections.push(format!("Error ID: {}", id));
        }

        if let Some(cause) = &self.cause {
            sections.push(format!("Error: {}", cause));
        }

        if let Some(trace) = &self.trace {
            sections.push("Traceback:".to_string());
            for trace_line in trace.lines() {
                sections.push(format!("  {}", trace_line));
            }
        }

        sections.push(ERROR_BLOCK_DELIMITER.to_string());
        sections.join("\n")
    }
}
