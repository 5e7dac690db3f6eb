//! Builds a ready-to-use orchestrator from configuration

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    analyzer::{Analyzer, AnalysisOrchestrator, AnalyzerRegistry, HEURISTIC_ANALYZER},
    config::{BackendSettings, ConfigurationManager, EngineConfig},
    error::AnalysisError,
    heuristic::HeuristicAnalyzer,
    providers::{AnthropicAnalyzer, OllamaAnalyzer, OpenAiAnalyzer},
};

/// Factory for [`AnalysisOrchestrator`] instances
pub struct EngineFactory;

impl EngineFactory {
    /// Build an orchestrator from an already-loaded configuration
    ///
    /// The heuristic analyzer is registered when fallback to it is enabled or
    /// when it is the default analyzer. A backend that fails to construct is
    /// logged and left out; it never fails the build.
    pub fn build(config: &EngineConfig) -> Result<AnalysisOrchestrator, AnalysisError> {
        let config = config.clone().validated()?;
        let analysis = &config.analysis;
        let mut registry = AnalyzerRegistry::new();
        if analysis.enable_heuristic_fallback || analysis.default_analyzer == HEURISTIC_ANALYZER {
            registry.register(Arc::new(HeuristicAnalyzer::new()));
        }

        if is_enabled(&config.anthropic, true) {
            register(&mut registry, "anthropic", AnthropicAnalyzer::new(&config.anthropic));
        }
        if is_enabled(&config.openai, true) {
            register(&mut registry, "openai", OpenAiAnalyzer::new(&config.openai));
        }
        if is_enabled(&config.ollama, false) {
            register(&mut registry, "ollama", OllamaAnalyzer::new(&config.ollama));
        }

        let orchestrator = AnalysisOrchestrator::new(registry, analysis.default_analyzer.clone())
            .with_fallbacks(analysis.fallback_order.iter().cloned())
            .with_max_retries(analysis.max_retries)
            .with_retry_delay(analysis.retry_delay())
            .with_probe_timeout(analysis.probe_timeout());

        info!(
            "Analysis engine ready: order [{}], registered [{}]",
            orchestrator.effective_order().join(", "),
            orchestrator.registry().names().join(", ")
        );
        Ok(orchestrator)
    }

    /// Load configuration with precedence (defaults, files, environment) and build
    pub fn from_env() -> Result<AnalysisOrchestrator, AnalysisError> {
        let mut manager = ConfigurationManager::new();
        let config = manager.load_with_precedence()?;
        Self::build(config)
    }
}

/// Hosted backends default to enabled only when credentials are present
fn is_enabled(settings: &BackendSettings, needs_key: bool) -> bool {
    settings
        .enabled
        .unwrap_or(!needs_key || settings.api_key().is_some())
}

fn register<A>(registry: &mut AnalyzerRegistry, name: &str, built: Result<A, AnalysisError>)
where
    A: Analyzer + 'static,
{
    match built {
        Ok(analyzer) => {
            debug!("Registered {} analyzer", name);
            registry.register(Arc::new(analyzer));
        }
        Err(e) => warn!("Skipping {} analyzer: {}", name, e),
    }
}
