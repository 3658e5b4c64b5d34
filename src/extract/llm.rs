//! LLM-backed record extraction over an OpenAI-compatible endpoint
//!
//! Sends page HTML plus a schema instruction to a chat-completions API and
//! parses the reply into raw records. The model is asked for a bare JSON
//! array; anything that does not parse is a `MalformedOutput` failure
//! carrying a truncated response sample for debugging.

use crate::config::ExtractionConfig;
use crate::extract::{ExtractionFailure, RawRecord, RecordExtractor};
use crate::fetch::{FailureKind, PageContent};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Page HTML beyond this length is cut before prompting
const MAX_PROMPT_HTML_LEN: usize = 60_000;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Extraction collaborator calling an OpenAI-compatible chat completions API
pub struct LlmExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmExtractor {
    /// Builds the extractor from config plus the resolved API key
    pub fn new(config: &ExtractionConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn build_request(&self, page: &PageContent, schema_hint: &str) -> ChatRequest {
        let html: String = page.html.chars().take(MAX_PROMPT_HTML_LEN).collect();

        let system = format!(
            "You extract structured records from web page content. \
             Return ONLY a JSON array of objects, one object per record, \
             with exactly these fields: {}. \
             Preserve non-Latin text as-is and make all URLs absolute. \
             If no records are present, return [].",
            schema_hint
        );

        let user = format!("Page URL: {}\n\nPage content:\n{}", page.url, html);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl RecordExtractor for LlmExtractor {
    async fn extract(
        &self,
        page: &PageContent,
        schema_hint: &str,
    ) -> Result<Vec<RawRecord>, ExtractionFailure> {
        let request = self.build_request(page, schema_hint);

        tracing::debug!("Extraction request for {} (model {})", page.url, self.model);

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_service_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(classify_transport_error)?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ExtractionFailure::new(
                FailureKind::MalformedOutput,
                format!("response envelope is not valid JSON: {}", e),
            )
            .with_sample(&body)
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ExtractionFailure::new(
                    FailureKind::MalformedOutput,
                    "response contained no completion content",
                )
                .with_sample(&body)
            })?;

        parse_records(&content)
    }
}

/// Parses model output into raw records
///
/// Accepts a JSON array of objects or a single object; tolerates code fences
/// around the JSON. Objects get the model's `"error": false` marker stripped,
/// matching the service's habit of tagging each item.
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>, ExtractionFailure> {
    let stripped = strip_code_fence(content);

    let value: Value = serde_json::from_str(stripped).map_err(|e| {
        ExtractionFailure::new(
            FailureKind::MalformedOutput,
            format!("model output is not valid JSON: {}", e),
        )
        .with_sample(content)
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => vec![Value::Object(map)],
        other => {
            return Err(ExtractionFailure::new(
                FailureKind::MalformedOutput,
                format!("expected JSON array or object, got {}", json_type_name(&other)),
            )
            .with_sample(content));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(mut map) => {
                if map.get("error") == Some(&Value::Bool(false)) {
                    map.remove("error");
                }
                records.push(map);
            }
            other => {
                return Err(ExtractionFailure::new(
                    FailureKind::MalformedOutput,
                    format!("array item is not an object: {}", json_type_name(&other)),
                )
                .with_sample(content));
            }
        }
    }

    Ok(records)
}

/// Strips a ```json ... ``` fence if the model wrapped its output in one
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn classify_transport_error(e: reqwest::Error) -> ExtractionFailure {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_connect() {
        FailureKind::Connect
    } else {
        FailureKind::ServiceError
    };

    ExtractionFailure::new(kind, e.to_string())
}

fn classify_service_status(status: StatusCode, body: &str) -> ExtractionFailure {
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        s if s.is_server_error() => FailureKind::ServiceError,
        s => FailureKind::HttpStatus(s.as_u16()),
    };

    ExtractionFailure::new(kind, format!("extraction service returned HTTP {}", status.as_u16()))
        .with_sample(body)
}
