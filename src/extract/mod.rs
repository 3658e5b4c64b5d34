//! Extraction collaborator interface
//!
//! The LLM call is treated as an external collaborator behind the
//! [`RecordExtractor`] trait. Records cross this boundary as loosely-typed
//! JSON maps and only become trusted data after the validator passes them;
//! keeping the type-unsafe surface this small is deliberate.

mod llm;

pub use llm::LlmExtractor;

use crate::fetch::{FailureKind, PageContent};
use async_trait::async_trait;
use std::fmt;

/// A raw record as extracted by the model, before validation
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Maximum length of the raw response sample kept for debugging
pub const RESPONSE_SAMPLE_LEN: usize = 200;

/// A failed extraction attempt
#[derive(Debug, Clone)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Truncated raw service response, attached to ERROR log context
    pub response_sample: Option<String>,
}

impl ExtractionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response_sample: None,
        }
    }

    /// Attaches a truncated sample of the raw response
    pub fn with_sample(mut self, raw: &str) -> Self {
        self.response_sample = Some(truncate_sample(raw));
        self
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Truncates a raw response on a character boundary for log context
pub fn truncate_sample(raw: &str) -> String {
    if raw.chars().count() <= RESPONSE_SAMPLE_LEN {
        return raw.to_string();
    }
    raw.chars().take(RESPONSE_SAMPLE_LEN).collect()
}

/// Extraction collaborator interface
///
/// One page may yield several records (a listing page holds many items).
/// The schema hint tells the model which fields to produce.
#[async_trait]
pub trait RecordExtractor: Send + Sync {
    async fn extract(
        &self,
        page: &PageContent,
        schema_hint: &str,
    ) -> Result<Vec<RawRecord>, ExtractionFailure>;
}
