//! Configuration module for Pagemill
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus resolving the extraction API credential from the environment.
//!
//! # Example
//!
//! ```no_run
//! use pagemill::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Concurrency limit: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, FieldEntry, LoggingConfig, OutputConfig, PageEntry,
    RetryConfig, SchemaConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_api_key};
