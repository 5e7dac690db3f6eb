//! Backend adapters that drive hosted or local language models
//!
//! Every adapter follows the same shape: render a prompt, make one
//! timeout-bounded HTTP call, pull the JSON object out of the reply, decode it
//! leniently and convert it to the canonical response. Adapters never retry;
//! the orchestrator owns retry and fallback.

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::{error::AnalysisError, redaction::redact_with_secret};

use self::wire::ExpectedFields;

pub mod anthropic;
pub mod extract;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod wire;

pub use anthropic::AnthropicAnalyzer;
pub use extract::extract_json_object;
pub use ollama::{GenerationParams, LocalModel, ModelProfile, OllamaAnalyzer};
pub use openai::OpenAiAnalyzer;

/// Retry-After assumed when a 429 carries no usable header
const DEFAULT_RATE_LIMIT_SECS: u64 = 60;

/// Longest backend error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client with a whole-request timeout
pub(crate) fn build_client(backend: &str, timeout: Duration) -> Result<Client, AnalysisError> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        AnalysisError::Config(format!("Failed to build {} HTTP client: {}", backend, e))
    })
}

/// Strip a trailing slash so `{base}/path` joins cleanly
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Map a transport failure, logging it first
pub(crate) fn transport_error(backend: &str, err: reqwest::Error) -> AnalysisError {
    error!("{} API request failed: {}", backend, err);
    AnalysisError::from(err)
}

/// Turn a non-success response into a descriptive error
///
/// The body is redacted before it reaches logs or the error text.
pub(crate) async fn error_for_status(
    backend: &str,
    response: Response,
    secret: Option<&str>,
) -> AnalysisError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let body = redact_with_secret(&body, secret);
    error!("{} API error ({}): {}", backend, status, body);

    match status.as_u16() {
        401 | 403 => AnalysisError::AuthError(format!(
            "{} rejected the credentials ({})",
            backend, status
        )),
        429 => AnalysisError::RateLimited(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_SECS)),
        code => AnalysisError::Backend {
            status: code,
            message: format!("{} API error: {}", backend, truncate(&body)),
        },
    }
}

/// Extract and decode the JSON object in a model reply
pub(crate) fn decode_reply<T: DeserializeOwned + ExpectedFields>(
    backend: &str,
    reply: &str,
) -> Result<T, AnalysisError> {
    let json = extract_json_object(reply).map_err(|err| {
        debug!("{} reply without JSON object: {}", backend, truncate(reply));
        err
    })?;
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        AnalysisError::Parse(format!("{} reply is not valid JSON: {}", backend, e))
    })?;
    let recognized = T::FIELDS
        .iter()
        .any(|field| value.get(*field).map_or(false, |v| !v.is_null()));
    if !recognized {
        debug!("{} reply has no analysis fields: {}", backend, truncate(json));
        return Err(AnalysisError::Parse(format!(
            "{} reply has none of the expected fields: {}",
            backend,
            truncate(json)
        )));
    }
    serde_json::from_value(value).map_err(|e| {
        AnalysisError::Parse(format!(
            "{} reply did not match the expected schema: {}",
            backend, e
        ))
    })
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
