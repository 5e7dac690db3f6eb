//! Engine configuration loading and validation
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Global config file (`~/.depwise/config.yaml`)
//! 3. Project config file (`./.depwise/config.yaml`)
//! 4. Environment variables

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{analyzer::HEURISTIC_ANALYZER, error::AnalysisError};

/// Names an analyzer may be registered under
pub const KNOWN_ANALYZERS: &[&str] = &[HEURISTIC_ANALYZER, "anthropic", "openai", "ollama"];

/// Upper bound on `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub default_analyzer: String,
    pub fallback_order: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub probe_timeout_ms: u64,
    pub enable_heuristic_fallback: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            default_analyzer: HEURISTIC_ANALYZER.to_string(),
            fallback_order: vec![HEURISTIC_ANALYZER.to_string()],
            max_retries: 2,
            retry_delay_ms: 1000,
            probe_timeout_ms: 5000,
            enable_heuristic_fallback: true,
        }
    }
}

impl AnalysisSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Per-backend settings; unset fields fall back to the adapter's defaults
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub enabled: Option<bool>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BackendSettings {
    /// Overlay every field set in `other`
    pub fn merge(&mut self, other: BackendSettings) {
        overlay(&mut self.enabled, other.enabled);
        overlay(&mut self.api_key, other.api_key);
        overlay(&mut self.base_url, other.base_url);
        overlay(&mut self.model, other.model);
        overlay(&mut self.temperature, other.temperature);
        overlay(&mut self.top_p, other.top_p);
        overlay(&mut self.max_tokens, other.max_tokens);
        overlay(&mut self.timeout_secs, other.timeout_secs);
    }

    /// API key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn validate(&self, backend: &str) -> Result<(), AnalysisError> {
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AnalysisError::Config(format!(
                    "{} base URL must start with http:// or https://, got '{}'",
                    backend, url
                )));
            }
        }
        if self.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
            return Err(AnalysisError::Config(format!(
                "{} model cannot be empty",
                backend
            )));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AnalysisError::Config(format!(
                    "{} temperature must be within [0, 2], got {}",
                    backend, temperature
                )));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(AnalysisError::Config(format!(
                    "{} top_p must be within (0, 1], got {}",
                    backend, top_p
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(AnalysisError::Config(format!(
                "{} max_tokens must be greater than 0",
                backend
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(AnalysisError::Config(format!(
                "{} timeout must be greater than 0",
                backend
            )));
        }
        Ok(())
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisSettings,
    pub anthropic: BackendSettings,
    pub openai: BackendSettings,
    pub ollama: BackendSettings,
}

impl EngineConfig {
    /// Parse a complete configuration from YAML
    pub fn from_yaml(content: &str) -> Result<Self, AnalysisError> {
        serde_yaml::from_str(content)
            .map_err(|e| AnalysisError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Add or remove `"heuristic"` at the end of the fallback order
    pub fn normalize(&mut self) {
        let order = &mut self.analysis.fallback_order;
        order.retain(|name| !name.trim().is_empty());
        if self.analysis.enable_heuristic_fallback {
            if !order.iter().any(|name| name == HEURISTIC_ANALYZER) {
                order.push(HEURISTIC_ANALYZER.to_string());
            }
        } else {
            order.retain(|name| name != HEURISTIC_ANALYZER);
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let analysis = &self.analysis;

        if !KNOWN_ANALYZERS.contains(&analysis.default_analyzer.as_str()) {
            return Err(AnalysisError::Config(format!(
                "Unknown default analyzer '{}' (expected one of: {})",
                analysis.default_analyzer,
                KNOWN_ANALYZERS.join(", ")
            )));
        }
        if let Some(unknown) = analysis
            .fallback_order
            .iter()
            .find(|name| !KNOWN_ANALYZERS.contains(&name.as_str()))
        {
            return Err(AnalysisError::Config(format!(
                "Unknown analyzer '{}' in fallback order",
                unknown
            )));
        }
        if analysis.max_retries > MAX_RETRIES_LIMIT {
            return Err(AnalysisError::Config(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, analysis.max_retries
            )));
        }
        if analysis.probe_timeout_ms == 0 {
            return Err(AnalysisError::Config(
                "probe timeout must be greater than 0".to_string(),
            ));
        }

        self.anthropic.validate("anthropic")?;
        self.openai.validate("openai")?;
        self.ollama.validate("ollama")?;
        Ok(())
    }

    /// Normalize then validate
    pub fn validated(mut self) -> Result<Self, AnalysisError> {
        self.normalize();
        self.validate()?;
        Ok(self)
    }
}

/// Shape of a config file: every field optional so files overlay field by field
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EngineFileConfig {
    analysis: AnalysisFileSettings,
    anthropic: BackendSettings,
    openai: BackendSettings,
    ollama: BackendSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisFileSettings {
    default_analyzer: Option<String>,
    fallback_order: Option<Vec<String>>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    probe_timeout_ms: Option<u64>,
    enable_heuristic_fallback: Option<bool>,
}

/// Loads an [`EngineConfig`] from defaults, files and environment
pub struct ConfigurationManager {
    config: EngineConfig,
    global_path: Option<PathBuf>,
    project_path: PathBuf,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Manager using the standard global and project paths
    pub fn new() -> Self {
        Self::with_paths(Self::global_config_path(), Self::project_config_path())
    }

    /// Manager reading the given files instead of the standard ones
    pub fn with_paths(global_path: Option<PathBuf>, project_path: PathBuf) -> Self {
        Self {
            config: EngineConfig::default(),
            global_path,
            project_path,
        }
    }

    /// `~/.depwise/config.yaml`, if a home directory exists
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".depwise").join("config.yaml"))
    }

    /// `./.depwise/config.yaml`
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".depwise").join("config.yaml")
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// Apply every layer in precedence order, then normalize and validate
    pub fn load_with_precedence(&mut self) -> Result<&EngineConfig, AnalysisError> {
        if let Some(global) = self.global_path.clone() {
            if global.exists() {
                debug!("Loading global config from {:?}", global);
                self.merge_from_file(&global)?;
            }
        }

        let project = self.project_path.clone();
        if project.exists() {
            debug!("Loading project config from {:?}", project);
            self.merge_from_file(&project)?;
        }

        self.load_from_env();

        self.config.normalize();
        self.config.validate()?;
        Ok(&self.config)
    }

    /// Overlay the fields present in a YAML file; a missing file is skipped
    pub fn merge_from_file(&mut self, path: &Path) -> Result<(), AnalysisError> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        // an empty file deserializes to null
        if content.trim().is_empty() {
            return Ok(());
        }

        let file: EngineFileConfig = serde_yaml::from_str(&content).map_err(|e| {
            AnalysisError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let analysis = &mut self.config.analysis;
        let overlay = file.analysis;
        if let Some(default_analyzer) = overlay.default_analyzer {
            analysis.default_analyzer = default_analyzer;
        }
        if let Some(fallback_order) = overlay.fallback_order {
            analysis.fallback_order = fallback_order;
        }
        if let Some(max_retries) = overlay.max_retries {
            analysis.max_retries = max_retries;
        }
        if let Some(retry_delay_ms) = overlay.retry_delay_ms {
            analysis.retry_delay_ms = retry_delay_ms;
        }
        if let Some(probe_timeout_ms) = overlay.probe_timeout_ms {
            analysis.probe_timeout_ms = probe_timeout_ms;
        }
        if let Some(enabled) = overlay.enable_heuristic_fallback {
            analysis.enable_heuristic_fallback = enabled;
        }

        self.config.anthropic.merge(file.anthropic);
        self.config.openai.merge(file.openai);
        self.config.ollama.merge(file.ollama);
        Ok(())
    }

    /// Overlay environment variables; invalid values are logged and ignored
    pub fn load_from_env(&mut self) {
        let config = &mut self.config;

        if let Some(key) = env_value("ANTHROPIC_API_KEY") {
            debug!("Loading ANTHROPIC_API_KEY from environment");
            config.anthropic.api_key = Some(key);
        }
        if let Some(url) = env_value("ANTHROPIC_BASE_URL") {
            config.anthropic.base_url = Some(url);
        }
        if let Some(key) = env_value("OPENAI_API_KEY") {
            debug!("Loading OPENAI_API_KEY from environment");
            config.openai.api_key = Some(key);
        }
        if let Some(url) = env_value("OPENAI_BASE_URL") {
            config.openai.base_url = Some(url);
        }
        if let Some(url) = env_value("OLLAMA_BASE_URL") {
            debug!("Loading OLLAMA_BASE_URL from environment: {}", url);
            config.ollama.base_url = Some(url);
        }
        if let Some(model) = env_value("OLLAMA_MODEL") {
            debug!("Loading OLLAMA_MODEL from environment: {}", model);
            config.ollama.model = Some(model);
        }

        let analysis = &mut config.analysis;
        if let Some(name) = env_value("DEPWISE_DEFAULT_ANALYZER") {
            analysis.default_analyzer = name;
        }
        if let Some(order) = env_value("DEPWISE_FALLBACK_ORDER") {
            analysis.fallback_order = order
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = env_parsed::<u32>("DEPWISE_MAX_RETRIES") {
            analysis.max_retries = value;
        }
        if let Some(value) = env_parsed::<u64>("DEPWISE_RETRY_DELAY_MS") {
            analysis.retry_delay_ms = value;
        }
        if let Some(raw) = env_value("DEPWISE_ENABLE_HEURISTIC_FALLBACK") {
            match parse_flag(&raw) {
                Some(flag) => analysis.enable_heuristic_fallback = flag,
                None => warn!("Invalid DEPWISE_ENABLE_HEURISTIC_FALLBACK value: {}", raw),
            }
        }
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_value(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value: {}", name, raw);
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
