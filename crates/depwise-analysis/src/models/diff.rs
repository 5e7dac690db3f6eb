//! Version diff analysis request/response

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RiskLevel, UpdateType};

/// How a file changed between the two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeType {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
}

/// Per-file change record from a structural diff
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub change_type: FileChangeType,
    #[serde(default)]
    pub lines_added: u32,
    #[serde(default)]
    pub lines_removed: u32,
}

/// Request to analyze the structural diff between two versions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionDiffAnalysisRequest {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    /// Free-text diff (unified diff or prose summary)
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    #[serde(default)]
    pub package_manager: String,
    #[serde(default)]
    pub language: String,
}

impl VersionDiffAnalysisRequest {
    /// Total (added, removed) line counts across all file changes
    pub fn line_totals(&self) -> (u64, u64) {
        self.file_changes.iter().fold((0, 0), |(added, removed), change| {
            (
                added + u64::from(change.lines_added),
                removed + u64::from(change.lines_removed),
            )
        })
    }
}

/// Kind of change to a public API element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiChangeKind {
    Added,
    Removed,
    #[default]
    Modified,
    Renamed,
}

impl ApiChangeKind {
    /// Parse a backend-supplied string, defaulting to `Modified` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "added" | "add" | "new" => ApiChangeKind::Added,
            "removed" | "remove" | "deleted" => ApiChangeKind::Removed,
            "renamed" | "rename" => ApiChangeKind::Renamed,
            _ => ApiChangeKind::Modified,
        }
    }
}

/// A change to the package's public API surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiChange {
    pub kind: ApiChangeKind,
    /// Symbol, endpoint or file affected
    pub element: String,
    pub description: String,
    pub breaking: bool,
    pub confidence: f64,
}

/// A runtime behavior change that is not visible in signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorChange {
    pub description: String,
    pub impact: RiskLevel,
    pub confidence: f64,
}

/// Estimated effort to migrate to the new version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationEffort {
    None,
    Low,
    #[default]
    Medium,
    High,
}

impl MigrationEffort {
    /// Parse a backend-supplied string, defaulting to `Medium` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "trivial" => MigrationEffort::None,
            "low" | "small" | "minimal" => MigrationEffort::Low,
            "medium" | "moderate" => MigrationEffort::Medium,
            "high" | "large" | "significant" => MigrationEffort::High,
            _ => MigrationEffort::Medium,
        }
    }
}

impl fmt::Display for MigrationEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationEffort::None => "none",
            MigrationEffort::Low => "low",
            MigrationEffort::Medium => "medium",
            MigrationEffort::High => "high",
        };
        f.write_str(label)
    }
}

/// Result of a version diff analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiffAnalysisResponse {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    pub update_type: UpdateType,
    /// Narrative of what the change means semantically
    pub semantic_impact: String,
    pub api_changes: Vec<ApiChange>,
    pub behavior_changes: Vec<BehaviorChange>,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub backward_compatible: bool,
    pub migration_effort: MigrationEffort,
    pub summary: String,
}

impl VersionDiffAnalysisResponse {
    /// Every per-item confidence in the response
    pub fn item_confidences(&self) -> Vec<f64> {
        self.api_changes
            .iter()
            .map(|c| c.confidence)
            .chain(self.behavior_changes.iter().map(|c| c.confidence))
            .collect()
    }
}
