//! Compatibility prediction request/response

use serde::{Deserialize, Serialize};

use super::{ProjectContext, RiskLevel};

/// Directed edge `from -> to` meaning `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// Resolved dependency graph of the consuming project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Names of packages that directly depend on `package`
    pub fn dependents_of(&self, package: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.to == package)
            .map(|edge| edge.from.as_str())
            .collect()
    }
}

/// Request to predict whether an update is compatible with a project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompatibilityPredictionRequest {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    #[serde(default)]
    pub project: ProjectContext,
    #[serde(default)]
    pub dependency_graph: Option<DependencyGraph>,
}

/// A predicted incompatibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub description: String,
    pub severity: RiskLevel,
    /// Probability that the issue materializes, in `[0, 1]`
    pub likelihood: f64,
    pub mitigation: String,
    /// How sure the analyzer is about this issue, in `[0, 1]`
    pub confidence: f64,
}

/// Result of a compatibility prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityPredictionResponse {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    /// Overall compatibility, in `[0, 1]`
    pub compatibility_score: f64,
    pub issues: Vec<CompatibilityIssue>,
    /// Ordered migration steps
    pub migration_steps: Vec<String>,
    pub testing_recommendations: Vec<String>,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub summary: String,
}
