//! Update classification request/response

use serde::{Deserialize, Serialize};

use super::{CategoryKind, Priority, ProjectContext, RiskLevel, UpdateType, Urgency};

/// Request to classify an update for scheduling
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateClassificationRequest {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub project: ProjectContext,
}

/// Independent relevance weight for one category
///
/// Weights are not normalized; several categories may each be highly relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category: CategoryKind,
    pub weight: f64,
}

/// Aggregate risk judgment with its contributing factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
    pub factors: Vec<String>,
}

/// Result of an update classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateClassificationResponse {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    pub update_type: UpdateType,
    pub priority: Priority,
    pub urgency: Urgency,
    pub categories: Vec<CategoryWeight>,
    pub risk: RiskAssessment,
    pub confidence: f64,
    pub summary: String,
}

impl UpdateClassificationResponse {
    /// Weight for a category, or `0.0` if the category was not emitted
    pub fn weight_of(&self, category: CategoryKind) -> f64 {
        self.categories
            .iter()
            .filter(|c| c.category == category)
            .map(|c| c.weight)
            .sum()
    }
}
