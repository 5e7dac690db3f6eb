//! OpenAI chat completions adapter

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

pub const OPENAI: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Analyzer backed by the OpenAI chat completions API
pub struct OpenAiAnalyzer {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl fmt::Debug for OpenAiAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAnalyzer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiAnalyzer {
    pub fn new(settings: &BackendSettings) -> Result<Self, AnalysisError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| AnalysisError::Config("OpenAI API key is required".to_string()))?
            .to_string();
        let timeout =
            Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            api_key,
            client: build_client(OPENAI, timeout)?,
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

    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!("Sending analysis request to OpenAI for model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(OPENAI, e))?;

        if !response.status().is_success() {
            return Err(error_for_status(OPENAI, response, Some(&self.api_key)).await);
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalysisError::Parse("OpenAI reply contained no choices".to_string()))
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    fn name(&self) -> &str {
        OPENAI
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn is_available(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("OpenAI probe failed with status: {}", response.status());
                false
            }
            Err(e) => {
                warn!("OpenAI probe failed: {}", e);
                false
            }
        }
    }

    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::changelog_prompt(request)).await?;
        let raw: RawChangelogAnalysis = decode_reply(OPENAI, &reply)?;
        Ok(raw.into_response(request, OPENAI))
    }

    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::version_diff_prompt(request)).await?;
        let raw: RawVersionDiffAnalysis = decode_reply(OPENAI, &reply)?;
        Ok(raw.into_response(request, OPENAI))
    }

    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        let reply = self.complete(&prompt::compatibility_prompt(request)).await?;
        let raw: RawCompatibilityPrediction = decode_reply(OPENAI, &reply)?;
        Ok(raw.into_response(request, OPENAI))
    }

    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        let reply = self.complete(&prompt::classification_prompt(request)).await?;
        let raw: RawUpdateClassification = decode_reply(OPENAI, &reply)?;
        Ok(raw.into_response(request, OPENAI))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
