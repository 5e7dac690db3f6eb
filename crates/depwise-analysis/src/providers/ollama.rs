//! Local model adapter for an Ollama server
//!
//! Runs analyses against models served locally, so no changelog or diff text
//! leaves the machine. The active model can be swapped at runtime; each model
//! family gets generation parameters tuned for structured output.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

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

pub const OLLAMA: &str = "ollama";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
/// Local generation is slow on CPU-only hosts
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Sampling and context settings sent with every generate call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub num_ctx: u32,
}

/// Generation parameters tuned for one model family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub family: &'static str,
    pub params: GenerationParams,
}

impl ModelProfile {
    const fn new(
        family: &'static str,
        temperature: f32,
        top_p: f32,
        num_predict: u32,
        num_ctx: u32,
    ) -> Self {
        Self {
            family,
            params: GenerationParams {
                temperature,
                top_p,
                num_predict,
                num_ctx,
            },
        }
    }

    /// Pick the profile for a model tag such as `qwen2.5-coder:7b`
    pub fn for_model(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        // Code models first: "codellama" also contains "llama".
        if name.contains("codellama") || name.contains("deepseek") {
            Self::new("code", 0.05, 0.9, 4096, 16384)
        } else if name.contains("qwen") {
            Self::new("qwen", 0.1, 0.9, 4096, 32768)
        } else if name.contains("mistral") || name.contains("mixtral") {
            Self::new("mistral", 0.1, 0.9, 4096, 32768)
        } else if name.contains("llama") {
            Self::new("llama", 0.1, 0.9, 4096, 8192)
        } else if name.contains("phi") || name.contains("gemma") {
            Self::new("small", 0.2, 0.95, 2048, 4096)
        } else {
            Self::new("default", 0.1, 0.9, 2048, 4096)
        }
    }
}

/// A model installed on the Ollama server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalModel {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<String>,
    pub family: Option<String>,
}

/// Explicit config values that win over the model profile
#[derive(Debug, Clone, Copy, Default)]
struct ParamOverrides {
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
}

impl ParamOverrides {
    fn apply(&self, mut params: GenerationParams) -> GenerationParams {
        if let Some(temperature) = self.temperature {
            params.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            params.top_p = top_p;
        }
        if let Some(max_tokens) = self.max_tokens {
            params.num_predict = max_tokens;
        }
        params
    }
}

#[derive(Debug, Clone)]
struct ActiveModel {
    name: String,
    params: GenerationParams,
}

/// Analyzer backed by a local Ollama server
#[derive(Debug)]
pub struct OllamaAnalyzer {
    client: Client,
    base_url: String,
    overrides: ParamOverrides,
    active: RwLock<ActiveModel>,
}

impl OllamaAnalyzer {
    pub fn new(settings: &BackendSettings) -> Result<Self, AnalysisError> {
        let timeout =
            Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let overrides = ParamOverrides {
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        };
        let name = settings
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();
        let params = overrides.apply(ModelProfile::for_model(&name).params);

        Ok(Self {
            client: build_client(OLLAMA, timeout)?,
            base_url: trim_base_url(settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            overrides,
            active: RwLock::new(ActiveModel { name, params }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Name of the model used for the next request
    pub fn current_model(&self) -> String {
        self.active.read().name.clone()
    }

    /// Generation parameters of the active model, overrides applied
    pub fn generation_params(&self) -> GenerationParams {
        self.active.read().params
    }

    /// Swap the active model without rebuilding the adapter
    ///
    /// The server is not consulted; an unknown tag surfaces as a backend error
    /// on the next analysis.
    pub fn switch_model(&self, name: &str) -> Result<(), AnalysisError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnalysisError::Config(
                "Model name must not be empty".to_string(),
            ));
        }

        let profile = ModelProfile::for_model(name);
        let params = self.overrides.apply(profile.params);
        let previous = {
            let mut active = self.active.write();
            std::mem::replace(
                &mut *active,
                ActiveModel {
                    name: name.to_string(),
                    params,
                },
            )
        };
        info!(
            "Switched Ollama model from {} to {} ({} profile)",
            previous.name, name, profile.family
        );
        Ok(())
    }

    /// Models installed on the server
    pub async fn list_models(&self) -> Result<Vec<LocalModel>, AnalysisError> {
        debug!("Fetching models from Ollama at {}", self.base_url);

        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error(OLLAMA, e))?;

        if !response.status().is_success() {
            return Err(error_for_status(OLLAMA, response, None).await);
        }

        let tags: TagsResponse = response.json().await?;
        let models: Vec<LocalModel> = tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|model| LocalModel {
                name: model.name,
                size: model.size.unwrap_or(0),
                modified_at: model.modified_at,
                family: model.details.and_then(|details| details.family),
            })
            .collect();

        debug!("Ollama reports {} installed models", models.len());
        Ok(models)
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        // Snapshot so the lock is released before the request is in flight.
        let ActiveModel { name, params } = self.active.read().clone();

        let request = GenerateRequest {
            model: &name,
            prompt,
            system: prompt::SYSTEM_PROMPT,
            stream: false,
            format: "json",
            options: params,
        };

        debug!("Sending analysis request to Ollama for model: {}", name);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(OLLAMA, e))?;

        if !response.status().is_success() {
            return Err(error_for_status(OLLAMA, response, None).await);
        }

        let body: GenerateResponse = response.json().await?;
        if body.response.trim().is_empty() {
            return Err(AnalysisError::Parse(format!(
                "Ollama model {} returned an empty response",
                name
            )));
        }
        Ok(body.response)
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    fn name(&self) -> &str {
        OLLAMA
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("Ollama is available at {}", self.base_url);
                true
            }
            Ok(response) => {
                warn!("Ollama probe failed with status: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Ollama not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }

    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::changelog_prompt(request)).await?;
        let raw: RawChangelogAnalysis = decode_reply(OLLAMA, &reply)?;
        Ok(raw.into_response(request, OLLAMA))
    }

    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        let reply = self.complete(&prompt::version_diff_prompt(request)).await?;
        let raw: RawVersionDiffAnalysis = decode_reply(OLLAMA, &reply)?;
        Ok(raw.into_response(request, OLLAMA))
    }

    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        let reply = self.complete(&prompt::compatibility_prompt(request)).await?;
        let raw: RawCompatibilityPrediction = decode_reply(OLLAMA, &reply)?;
        Ok(raw.into_response(request, OLLAMA))
    }

    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        let reply = self.complete(&prompt::classification_prompt(request)).await?;
        let raw: RawUpdateClassification = decode_reply(OLLAMA, &reply)?;
        Ok(raw.into_response(request, OLLAMA))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagModel>>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> OllamaAnalyzer {
        OllamaAnalyzer::new(&BackendSettings::default()).unwrap()
    }

    #[test]
    fn test_defaults_need_no_credentials() {
        let ollama = analyzer();
        assert_eq!(ollama.current_model(), DEFAULT_MODEL);
        assert_eq!(ollama.base_url(), DEFAULT_BASE_URL);
        assert_eq!(ollama.generation_params(), ModelProfile::for_model("llama").params);
    }

    #[test]
    fn test_profiles_by_family() {
        assert_eq!(ModelProfile::for_model("codellama:13b").family, "code");
        assert_eq!(ModelProfile::for_model("deepseek-coder:6.7b").family, "code");
        assert_eq!(ModelProfile::for_model("qwen2.5-coder:7b").family, "qwen");
        assert_eq!(ModelProfile::for_model("Mistral:7B").family, "mistral");
        assert_eq!(ModelProfile::for_model("llama3.1:8b").family, "llama");
        assert_eq!(ModelProfile::for_model("phi3:mini").family, "small");
        assert_eq!(ModelProfile::for_model("starcoder2").family, "default");
    }

    #[test]
    fn test_switch_model_swaps_profile() {
        let ollama = analyzer();
        ollama.switch_model(" qwen2.5:14b ").unwrap();
        assert_eq!(ollama.current_model(), "qwen2.5:14b");
        assert_eq!(ollama.generation_params().num_ctx, 32768);
    }

    #[test]
    fn test_switch_model_rejects_empty_name() {
        let ollama = analyzer();
        let err = ollama.switch_model("  ").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
        assert_eq!(ollama.current_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_overrides_survive_switch() {
        let ollama = OllamaAnalyzer::new(&BackendSettings {
            temperature: Some(0.0),
            max_tokens: Some(512),
            ..Default::default()
        })
        .unwrap();
        ollama.switch_model("phi3:mini").unwrap();

        let params = ollama.generation_params();
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.num_predict, 512);
        assert_eq!(params.top_p, 0.95);
        assert_eq!(params.num_ctx, 4096);
    }

    #[test]
    fn test_tags_decoding_tolerates_missing_fields() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models": [{"name": "llama3.1:8b", "size": 4661224676, "details": {"family": "llama"}}, {"name": "bare"}]}"#,
        )
        .unwrap();
        let models = tags.models.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].size, Some(4661224676));
        assert!(models[1].details.is_none());
    }
}
