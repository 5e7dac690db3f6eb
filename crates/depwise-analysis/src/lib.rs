//! Depwise Analysis - dependency update analysis across multiple backends
//!
//! Judges the risk of upgrading a dependency from its changelog, its version
//! diff and the consuming project. Hosted models (Anthropic, OpenAI), a local
//! Ollama server and a deterministic rule-based engine all implement the same
//! [`Analyzer`] trait; [`AnalysisOrchestrator`] tries them in a configured order
//! with retry, fallback and cancellation.
//!
//! ```no_run
//! use depwise_analysis::{AnalysisContext, ChangelogAnalysisRequest, EngineFactory};
//!
//! # async fn run() -> Result<(), depwise_analysis::AnalysisError> {
//! let engine = EngineFactory::from_env()?;
//! let request = ChangelogAnalysisRequest {
//!     package_name: "serde".to_string(),
//!     from_version: "1.0.100".to_string(),
//!     to_version: "1.0.200".to_string(),
//!     changelog: "Fixed a panic when deserializing empty maps".to_string(),
//!     ..Default::default()
//! };
//! let response = engine
//!     .analyze_changelog(&AnalysisContext::new(), &request)
//!     .await?;
//! println!("{}: {}", response.risk_level, response.summary);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod heuristic;
pub mod models;
pub mod providers;
pub mod redaction;

pub use analyzer::{AnalysisOrchestrator, Analyzer, AnalyzerRegistry, HEURISTIC_ANALYZER};
pub use config::{AnalysisSettings, BackendSettings, ConfigurationManager, EngineConfig};
pub use context::AnalysisContext;
pub use error::AnalysisError;
pub use factory::EngineFactory;
pub use heuristic::HeuristicAnalyzer;
pub use models::{
    ApiChange, ApiChangeKind, BehaviorChange, BreakingChange, BugFix, CategoryKind,
    CategoryWeight, ChangelogAnalysisRequest, ChangelogAnalysisResponse, CompatibilityIssue,
    CompatibilityPredictionRequest, CompatibilityPredictionResponse, DependencyEdge,
    DependencyGraph, DependencyInfo, Deprecation, Feature, FileChange, FileChangeType,
    MigrationEffort, Priority, ProjectContext, RiskAssessment, RiskLevel, SecurityFix,
    UpdateClassificationRequest, UpdateClassificationResponse, UpdateType, Urgency,
    VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
};
pub use providers::{
    AnthropicAnalyzer, GenerationParams, LocalModel, ModelProfile, OllamaAnalyzer, OpenAiAnalyzer,
};
