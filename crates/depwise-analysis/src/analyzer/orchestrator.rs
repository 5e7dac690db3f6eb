//! Orchestrator that drives analyzers with availability probing, retry and fallback

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Analyzer, AnalyzerRegistry, HEURISTIC_ANALYZER};
use crate::{
    context::AnalysisContext,
    error::AnalysisError,
    models::{
        ChangelogAnalysisRequest, ChangelogAnalysisResponse, CompatibilityPredictionRequest,
        CompatibilityPredictionResponse, UpdateClassificationRequest,
        UpdateClassificationResponse, VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
    },
};

/// Default number of additional attempts per analyzer
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay between attempts on the same analyzer
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on an availability probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Central coordinator for analysis calls
///
/// Analyzers are tried strictly one at a time in the effective order
/// `[default] + fallbacks`. State is immutable after construction, so a single
/// orchestrator can be shared behind an `Arc` by concurrent callers.
#[derive(Clone, Debug)]
pub struct AnalysisOrchestrator {
    registry: AnalyzerRegistry,
    default_analyzer: String,
    fallbacks: Vec<String>,
    order: Vec<String>,
    max_retries: u32,
    retry_delay: Duration,
    probe_timeout: Duration,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with no fallbacks
    pub fn new(registry: AnalyzerRegistry, default_analyzer: impl Into<String>) -> Self {
        let default_analyzer = default_analyzer.into();
        let order = effective_order(&default_analyzer, &[]);
        Self {
            registry,
            default_analyzer,
            fallbacks: Vec::new(),
            order,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the ordered fallback list tried after the default analyzer
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self.order = effective_order(&self.default_analyzer, &self.fallbacks);
        self
    }

    /// Set the number of additional attempts per analyzer
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the fixed delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the upper bound on each availability probe
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn default_analyzer(&self) -> &str {
        &self.default_analyzer
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// De-duplicated `[default] + fallbacks`
    pub fn effective_order(&self) -> &[String] {
        &self.order
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    /// Registered analyzer names: those in the effective order first, then the rest
    pub fn available_analyzers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .order
            .iter()
            .filter(|name| self.registry.contains(name))
            .cloned()
            .collect();
        for name in self.registry.names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Analyze changelog text, falling back across analyzers
    pub async fn analyze_changelog(
        &self,
        ctx: &AnalysisContext,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        self.run_with_fallback(ctx, "analyze_changelog", |analyzer| async move {
            analyzer.analyze_changelog(request).await
        })
        .await
    }

    /// Analyze a version diff, falling back across analyzers
    pub async fn analyze_version_diff(
        &self,
        ctx: &AnalysisContext,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        self.run_with_fallback(ctx, "analyze_version_diff", |analyzer| async move {
            analyzer.analyze_version_diff(request).await
        })
        .await
    }

    /// Predict compatibility, falling back across analyzers
    pub async fn predict_compatibility(
        &self,
        ctx: &AnalysisContext,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        self.run_with_fallback(ctx, "predict_compatibility", |analyzer| async move {
            analyzer.predict_compatibility(request).await
        })
        .await
    }

    /// Classify an update, falling back across analyzers
    pub async fn classify_update(
        &self,
        ctx: &AnalysisContext,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        self.run_with_fallback(ctx, "classify_update", |analyzer| async move {
            analyzer.classify_update(request).await
        })
        .await
    }

    /// Try `operation` on each analyzer of the effective order until one succeeds
    ///
    /// Cancellation aborts immediately; every other failure moves on to the next
    /// analyzer once retries are exhausted.
    pub async fn run_with_fallback<T, F, Fut>(
        &self,
        ctx: &AnalysisContext,
        operation: &str,
        attempt: F,
    ) -> Result<T, AnalysisError>
    where
        F: Fn(Arc<dyn Analyzer>) -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        ctx.check()?;

        let mut attempted = Vec::new();
        let mut last_error: Option<AnalysisError> = None;

        for name in &self.order {
            ctx.check()?;

            let analyzer = match self.registry.get(name) {
                Ok(analyzer) => analyzer,
                Err(_) => {
                    debug!("Skipping analyzer '{}' for {}: not registered", name, operation);
                    continue;
                }
            };

            attempted.push(name.clone());

            if !self.probe(ctx, &analyzer).await? {
                warn!("Skipping analyzer '{}' for {}: unavailable", name, operation);
                last_error = Some(AnalysisError::Unavailable(name.clone()));
                continue;
            }

            match self.attempt_with_retry(ctx, operation, &analyzer, &attempt).await {
                Ok(response) => {
                    info!("{} completed by analyzer '{}'", operation, name);
                    return Ok(response);
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    warn!(
                        "Analyzer '{}' failed {}, falling back: {}",
                        name, operation, err
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(AnalysisError::Exhausted {
                attempted,
                last: Box::new(last),
            }),
            None => Err(AnalysisError::NoAnalyzers),
        }
    }

    /// Availability probe bounded by the probe timeout and the caller context
    ///
    /// The heuristic analyzer is never probed.
    async fn probe(
        &self,
        ctx: &AnalysisContext,
        analyzer: &Arc<dyn Analyzer>,
    ) -> Result<bool, AnalysisError> {
        if analyzer.name() == HEURISTIC_ANALYZER {
            return Ok(true);
        }

        let timeout = self.probe_timeout;
        ctx.run(async {
            match tokio::time::timeout(timeout, analyzer.is_available()).await {
                Ok(available) => {
                    debug!("Analyzer '{}' availability: {}", analyzer.name(), available);
                    Ok(available)
                }
                Err(_) => {
                    warn!("Availability probe for '{}' timed out", analyzer.name());
                    Ok(false)
                }
            }
        })
        .await
    }

    /// Run `attempt` against one analyzer, up to `max_retries` extra times
    async fn attempt_with_retry<T, F, Fut>(
        &self,
        ctx: &AnalysisContext,
        operation: &str,
        analyzer: &Arc<dyn Analyzer>,
        attempt: &F,
    ) -> Result<T, AnalysisError>
    where
        F: Fn(Arc<dyn Analyzer>) -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        let mut last_error = None;

        for attempt_no in 0..=self.max_retries {
            if attempt_no > 0 {
                ctx.sleep(self.retry_delay).await?;
            }

            debug!(
                "Attempt {}/{} of {} on analyzer '{}'",
                attempt_no + 1,
                self.max_retries + 1,
                operation,
                analyzer.name()
            );

            match ctx.run(attempt(Arc::clone(analyzer))).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    warn!(
                        "Analyzer '{}' attempt {}/{} failed: {}",
                        analyzer.name(),
                        attempt_no + 1,
                        self.max_retries + 1,
                        err
                    );
                    let retryable = err.is_retryable();
                    last_error = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AnalysisError::Internal(format!("no attempt made on '{}'", analyzer.name()))
        }))
    }
}

/// `[default] + fallbacks` without duplicates, keeping first occurrences
fn effective_order(default_analyzer: &str, fallbacks: &[String]) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for name in std::iter::once(default_analyzer).chain(fallbacks.iter().map(String::as_str)) {
        if !name.is_empty() && !order.iter().any(|existing| existing == name) {
            order.push(name.to_string());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::HeuristicAnalyzer;

    #[test]
    fn test_effective_order_deduplicates() {
        let order = effective_order(
            "openai",
            &[
                "anthropic".to_string(),
                "openai".to_string(),
                "heuristic".to_string(),
                "anthropic".to_string(),
            ],
        );
        assert_eq!(order, vec!["openai", "anthropic", "heuristic"]);
    }

    #[test]
    fn test_effective_order_skips_empty_default() {
        let order = effective_order("", &["heuristic".to_string()]);
        assert_eq!(order, vec!["heuristic"]);
    }

    #[test]
    fn test_available_analyzers_lists_order_first() {
        let mut registry = AnalyzerRegistry::new();
        registry.register(Arc::new(HeuristicAnalyzer::new()));
        let orchestrator = AnalysisOrchestrator::new(registry, "openai")
            .with_fallbacks(["ollama", "heuristic"]);

        assert_eq!(orchestrator.effective_order(), ["openai", "ollama", "heuristic"]);
        assert_eq!(orchestrator.available_analyzers(), vec!["heuristic"]);
    }

    #[tokio::test]
    async fn test_empty_registry_reports_no_analyzers() {
        let orchestrator = AnalysisOrchestrator::new(AnalyzerRegistry::new(), "heuristic");
        let result = orchestrator
            .analyze_changelog(&AnalysisContext::new(), &ChangelogAnalysisRequest::default())
            .await;
        assert_eq!(result.unwrap_err(), AnalysisError::NoAnalyzers);
    }
}
