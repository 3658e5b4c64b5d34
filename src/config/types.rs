use serde::Deserialize;

/// Main configuration structure for Pagemill
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    pub schema: SchemaConfig,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages processed concurrently
    pub concurrency: u32,
}

/// Retry and backoff configuration
///
/// Defaults match the documented policy: 3 attempts, exponential backoff
/// starting at 500ms and capped at 30s.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per page, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff delay cap in milliseconds
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Log sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rotated daily log files
    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// File size threshold that triggers rotation, in bytes
    #[serde(rename = "rotation-size-bytes", default = "default_rotation_size")]
    pub rotation_size_bytes: u64,

    /// Number of numbered backup files to retain
    #[serde(default = "default_retention")]
    pub retention: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            rotation_size_bytes: default_rotation_size(),
            retention: default_retention(),
        }
    }
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_rotation_size() -> u64 {
    10 * 1024 * 1024
}

fn default_retention() -> u32 {
    5
}

/// Extraction service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Model identifier sent with each extraction request
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "EXTRACTION_API_KEY".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV file that accepted records are appended to
    #[serde(rename = "csv-path")]
    pub csv_path: String,
}

/// Record schema configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Field whose value identifies a record for duplicate suppression
    #[serde(rename = "key-field")]
    pub key_field: String,

    /// Ordered list of required fields
    pub fields: Vec<FieldEntry>,
}

/// A single required field with its coarse type
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    /// Field name as it appears in the extracted record
    pub name: String,

    /// Coarse type: "text", "number", "list" or "any"
    #[serde(default = "default_field_kind")]
    pub kind: String,
}

fn default_field_kind() -> String {
    "text".to_string()
}

/// A page to process
#[derive(Debug, Clone, Deserialize)]
pub struct PageEntry {
    /// Absolute URL of the page
    pub url: String,
}
