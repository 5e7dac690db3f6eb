//! Anthropic messages API adapter

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    build_client, decode_reply, error_for_status, prompt, transport_error, trim_base_url,
    wire::{
        RawChangelogAnalysis, RawCompatibilityPrediction, RawUpdateClassification,
        RawVersionDiffAnalysis,
    },
};
use crate::{
    analyzer::Analyzer,
    config::BackendSettings,
    error::AnalysisError,
    models::{
        ChangelogAnalysisRequest, ChangelogAnalysisResponse, CompatibilityPredictionRequest,
        CompatibilityPredictionResponse, UpdateClassificationRequest,
        UpdateClassificationResponse, VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
    },
};

pub const ANTHROPIC: &str = "anthropic";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Analyzer backed by the Anthropic messages API
pub struct AnthropicAnalyzer {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl fmt::Debug for AnthropicAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicAnalyzer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl AnthropicAnalyzer {
    /// Build the adapter; an API key is required
    pub fn new(settings: &BackendSettings) -> Result<Self, AnalysisError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| AnalysisError::Config("Anthropic API key is required".to_string()))?
            .to_string();
        let timeout =
            Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            api_key,
            client: build_client(ANTHROPIC, timeout)?,
            base_url: trim_base_url(settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: settings.top_p.unwrap_or(DEFAULT_TOP_P),
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One messages call; returns the concatenated text blocks of the reply
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: prompt::SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            top_p: self.top_p,
        };

        debug!("Sending analysis request to Anthropic for model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(ANTHROPIC, e))?;

        if !response.status().is_success() {
            return Err(error_for_status(ANTHROPIC, response, Some(&self.api_key)).await);
        }

        let body: MessagesResponse = response.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AnalysisError::Parse(
                "Anthropic reply contained no text content".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl Analyzer for AnthropicAnalyzer {
    fn name(&self) -> &str {
        ANTHROPIC
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn is_available(&self) -> bool {
        debug!("Probing Anthropic availability at {}", self.base_url);
        let result = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Anthropic probe failed with status: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Anthropic probe failed: {}", e);
                false
            }
        }
    }

    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::changelog_prompt(request)).await?;
        let raw: RawChangelogAnalysis = decode_reply(ANTHROPIC, &reply)?;
        Ok(raw.into_response(request, ANTHROPIC))
    }

    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::version_diff_prompt(request)).await?;
        let raw: RawVersionDiffAnalysis = decode_reply(ANTHROPIC, &reply)?;
        Ok(raw.into_response(request, ANTHROPIC))
    }

    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        let reply = self.complete(&prompt::compatibility_prompt(request)).await?;
        let raw: RawCompatibilityPrediction = decode_reply(ANTHROPIC, &reply)?;
        Ok(raw.into_response(request, ANTHROPIC))
    }

    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        let reply = self.complete(&prompt::classification_prompt(request)).await?;
        let raw: RawUpdateClassification = decode_reply(ANTHROPIC, &reply)?;
        Ok(raw.into_response(request, ANTHROPIC))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
