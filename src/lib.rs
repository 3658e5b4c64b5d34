//! Pagemill: an LLM-assisted page extraction pipeline
//!
//! This crate ingests web pages, asks an LLM service to extract structured
//! fields from each page, validates the result against a required-field
//! schema, and appends valid records to a tabular output. Because both the
//! web and the model are unreliable, the heart of the crate is the
//! error-tracking, retry, and validation pipeline that makes extraction
//! observable: every failure is tagged with a unique error identifier that
//! can be grepped across the rotated log files.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod validate;

use thiserror::Error;

/// Main error type for Pagemill operations
///
/// Covers the failures that abort a run outright. Per-page fetch and
/// extraction failures never surface here: the pipeline records them and
/// keeps going, and validation rejections are data outcomes, not errors.
#[derive(Debug, Error)]
pub enum PagemillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
///
/// Configuration failure at startup (including a missing API credential) is
/// the only fatal error class; everything else is recorded per page and the
/// run continues.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

/// Result type alias for Pagemill operations
pub type Result<T> = std::result::Result<T, PagemillError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{ExtractionFailure, RawRecord, RecordExtractor};
pub use fetch::{FailureKind, FetchFailure, PageContent, PageFetcher};
pub use logging::{Component, CrawlLogger, ErrorId, ErrorIdMint, Severity};
pub use pipeline::{CrawlCoordinator, CrawlReport, PageOutcome, PageProcessor, RunStatistics};
pub use retry::{AttemptDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use validate::{validate, FieldKind, FieldSpec, ValidationOutcome, ValidationStatus, Violation};
