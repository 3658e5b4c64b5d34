use crate::config::types::{Config, CrawlerConfig, FieldEntry, PageEntry, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_logging_config(config)?;
    validate_extraction_config(config)?;
    validate_output_config(config)?;
    validate_schema(&config.schema.key_field, &config.schema.fields)?;
    validate_pages(&config.pages)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms < 1 {
        return Err(ConfigError::Validation(
            "base_delay_ms must be >= 1".to_string(),
        ));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= base_delay_ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates logging configuration
fn validate_logging_config(config: &Config) -> Result<(), ConfigError> {
    if config.logging.directory.is_empty() {
        return Err(ConfigError::Validation(
            "logging directory cannot be empty".to_string(),
        ));
    }

    if config.logging.rotation_size_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "rotation_size_bytes must be >= 1024, got {}",
            config.logging.rotation_size_bytes
        )));
    }

    if config.logging.retention < 1 {
        return Err(ConfigError::Validation(
            "retention must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates extraction service configuration
fn validate_extraction_config(config: &Config) -> Result<(), ConfigError> {
    Url::parse(&config.extraction.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid extraction base-url: {}", e)))?;

    if config.extraction.model.is_empty() {
        return Err(ConfigError::Validation(
            "extraction model cannot be empty".to_string(),
        ));
    }

    if config.extraction.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api-key-env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &Config) -> Result<(), ConfigError> {
    if config.output.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the record schema
///
/// The key field must be one of the declared fields, field names must be
/// unique, and every kind must be one of the coarse types the validator
/// understands.
fn validate_schema(key_field: &str, fields: &[FieldEntry]) -> Result<(), ConfigError> {
    if fields.is_empty() {
        return Err(ConfigError::Validation(
            "schema must declare at least one field".to_string(),
        ));
    }

    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "schema field name cannot be empty".to_string(),
            ));
        }

        match field.kind.as_str() {
            "text" | "number" | "list" | "any" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown field kind '{}' for field '{}' (expected text, number, list or any)",
                    other, field.name
                )));
            }
        }
    }

    for i in 0..fields.len() {
        for j in (i + 1)..fields.len() {
            if fields[i].name == fields[j].name {
                return Err(ConfigError::Validation(format!(
                    "duplicate schema field '{}'",
                    fields[i].name
                )));
            }
        }
    }

    if !fields.iter().any(|f| f.name == key_field) {
        return Err(ConfigError::Validation(format!(
            "key-field '{}' is not a declared schema field",
            key_field
        )));
    }

    Ok(())
}

/// Validates page entries
fn validate_pages(pages: &[PageEntry]) -> Result<(), ConfigError> {
    for entry in pages {
        let url = Url::parse(&entry.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid page URL '{}': {}", entry.url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Page URL '{}' must use http or https",
                entry.url
            )));
        }
    }

    Ok(())
}
