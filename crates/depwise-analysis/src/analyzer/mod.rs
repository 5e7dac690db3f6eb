//! Analyzer trait, registry and orchestrator

use async_trait::async_trait;

use crate::{
    error::AnalysisError,
    models::{
        ChangelogAnalysisRequest, ChangelogAnalysisResponse, CompatibilityPredictionRequest,
        CompatibilityPredictionResponse, UpdateClassificationRequest,
        UpdateClassificationResponse, VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
    },
};

pub mod orchestrator;
pub mod registry;

pub use orchestrator::AnalysisOrchestrator;
pub use registry::AnalyzerRegistry;

/// Name under which the rule-based analyzer registers itself
pub const HEURISTIC_ANALYZER: &str = "heuristic";

/// Core trait that every analyzer (rule-based or backend-backed) implements
///
/// Requests are borrowed immutably; an analyzer that cannot complete an
/// analysis returns an error instead of a partially-populated response.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Registry name of the analyzer (e.g. "openai", "heuristic")
    fn name(&self) -> &str;

    /// Version of the analyzer implementation or the model it drives
    fn version(&self) -> &str;

    /// Cheap liveness probe
    async fn is_available(&self) -> bool;

    /// Analyze changelog text between two versions
    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError>;

    /// Analyze the structural diff between two versions
    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError>;

    /// Predict compatibility of an update with a project
    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError>;

    /// Classify an update by type, priority, urgency and category
    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError>;
}
