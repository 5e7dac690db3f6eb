//! Canonical request/response data model shared by every analyzer
//!
//! All four request/response pairs echo `package_name`, `from_version` and
//! `to_version` unchanged, carry a per-finding `confidence` in `[0.0, 1.0]` and
//! one aggregate [`RiskLevel`].

use std::fmt;

use serde::{Deserialize, Serialize};

mod changelog;
mod classification;
mod compatibility;
mod diff;

pub use changelog::{
    BreakingChange, BugFix, ChangelogAnalysisRequest, ChangelogAnalysisResponse, Deprecation,
    Feature, SecurityFix,
};
pub use classification::{
    CategoryWeight, RiskAssessment, UpdateClassificationRequest, UpdateClassificationResponse,
};
pub use compatibility::{
    CompatibilityIssue, CompatibilityPredictionRequest, CompatibilityPredictionResponse,
    DependencyEdge, DependencyGraph,
};
pub use diff::{
    ApiChange, ApiChangeKind, BehaviorChange, FileChange, FileChangeType, MigrationEffort,
    VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
};

/// Clamp a confidence, likelihood or score into `[0.0, 1.0]`
///
/// NaN collapses to `0.0` so a misbehaving backend can never leak it.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Ordinal severity attached to every analysis response
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Parse a backend-supplied string, defaulting to `Medium` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "minimal" | "none" => RiskLevel::Low,
            "medium" | "moderate" => RiskLevel::Medium,
            "high" | "severe" => RiskLevel::High,
            "critical" => RiskLevel::Critical,
            _ => RiskLevel::Medium,
        }
    }

    /// Continuous score associated with this level
    pub fn score(self) -> f64 {
        match self {
            RiskLevel::Low => 0.2,
            RiskLevel::Medium => 0.5,
            RiskLevel::High => 0.75,
            RiskLevel::Critical => 0.95,
        }
    }

    /// Map a continuous score back onto the ordinal scale
    pub fn from_score(score: f64) -> Self {
        let score = clamp_unit(score);
        if score >= 0.9 {
            RiskLevel::Critical
        } else if score >= 0.65 {
            RiskLevel::High
        } else if score >= 0.35 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How soon an update should be scheduled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Parse a backend-supplied string, defaulting to `Medium` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "medium" | "normal" => Priority::Medium,
            "high" => Priority::High,
            "critical" | "urgent" => Priority::Critical,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time pressure on applying an update
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Urgent,
    Immediate,
}

impl Urgency {
    /// Parse a backend-supplied string, defaulting to `Normal` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "whenever" => Urgency::Low,
            "normal" | "medium" => Urgency::Normal,
            "urgent" | "high" | "soon" => Urgency::Urgent,
            "immediate" | "critical" => Urgency::Immediate,
            _ => Urgency::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
            Urgency::Immediate => "immediate",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic-version classification of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    Prerelease,
    #[default]
    Unknown,
}

impl UpdateType {
    /// Parse a backend-supplied string, defaulting to `Unknown` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "major" => UpdateType::Major,
            "minor" => UpdateType::Minor,
            "patch" => UpdateType::Patch,
            "prerelease" | "pre-release" | "pre_release" => UpdateType::Prerelease,
            _ => UpdateType::Unknown,
        }
    }

    /// Risk implied by the update type alone, used when no changelog text exists
    pub fn baseline_risk(self) -> RiskLevel {
        match self {
            UpdateType::Major => RiskLevel::High,
            UpdateType::Minor => RiskLevel::Medium,
            UpdateType::Patch => RiskLevel::Low,
            UpdateType::Prerelease => RiskLevel::Medium,
            UpdateType::Unknown => RiskLevel::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Major => "major",
            UpdateType::Minor => "minor",
            UpdateType::Patch => "patch",
            UpdateType::Prerelease => "prerelease",
            UpdateType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance category used by update classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Security,
    Feature,
    Bugfix,
    Maintenance,
    Performance,
}

impl CategoryKind {
    /// All categories in reporting order
    pub const ALL: [CategoryKind; 5] = [
        CategoryKind::Security,
        CategoryKind::Feature,
        CategoryKind::Bugfix,
        CategoryKind::Maintenance,
        CategoryKind::Performance,
    ];

    /// Parse a backend-supplied string, defaulting to `Maintenance` when unrecognized
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "security" => CategoryKind::Security,
            "feature" | "features" => CategoryKind::Feature,
            "bugfix" | "bug_fix" | "bugfixes" | "fix" => CategoryKind::Bugfix,
            "performance" | "perf" => CategoryKind::Performance,
            _ => CategoryKind::Maintenance,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Security => "security",
            CategoryKind::Feature => "feature",
            CategoryKind::Bugfix => "bugfix",
            CategoryKind::Maintenance => "maintenance",
            CategoryKind::Performance => "performance",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependency declared by the project under analysis
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
}

/// Context about the project consuming the dependency
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Primary language (e.g. "typescript", "python")
    pub language: String,
    /// Framework, when one is known (e.g. "react", "django")
    #[serde(default)]
    pub framework: Option<String>,
    /// Declared dependencies of the project
    #[serde(default)]
    pub dependencies: Vec<DependencyInfo>,
}

impl ProjectContext {
    /// One-line description used in prompts and summaries
    pub fn describe(&self) -> String {
        let language = if self.language.is_empty() {
            "unknown"
        } else {
            self.language.as_str()
        };
        match &self.framework {
            Some(framework) if !framework.is_empty() => {
                format!("{} ({}), {} dependencies", language, framework, self.dependencies.len())
            }
            _ => format!("{}, {} dependencies", language, self.dependencies.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_unknown_strings_map_to_middle_values() {
        assert_eq!(RiskLevel::from_str_lossy("catastrophic"), RiskLevel::Medium);
        assert_eq!(Priority::from_str_lossy(""), Priority::Medium);
        assert_eq!(Urgency::from_str_lossy("whenever-ish"), Urgency::Normal);
        assert_eq!(UpdateType::from_str_lossy("huge"), UpdateType::Unknown);
        assert_eq!(CategoryKind::from_str_lossy("docs"), CategoryKind::Maintenance);
        assert_eq!(RiskLevel::from_str_lossy(" HIGH "), RiskLevel::High);
    }

    #[test]
    fn test_score_round_trips_through_levels() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            assert_eq!(RiskLevel::from_score(level.score()), level);
        }
    }

    #[test]
    fn test_clamp_unit_handles_nan_and_bounds() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_enums_serialize_lowercase() {
        let json = serde_json::to_string(&UpdateType::Prerelease).unwrap();
        assert_eq!(json, "\"prerelease\"");
        let json = serde_json::to_string(&CategoryKind::Bugfix).unwrap();
        assert_eq!(json, "\"bugfix\"");
    }

    #[test]
    fn test_project_context_describe() {
        let ctx = ProjectContext {
            language: "typescript".to_string(),
            framework: Some("react".to_string()),
            dependencies: vec![DependencyInfo {
                name: "lodash".to_string(),
                version: "4.17.21".to_string(),
            }],
        };
        assert_eq!(ctx.describe(), "typescript (react), 1 dependencies");
        assert_eq!(ProjectContext::default().describe(), "unknown, 0 dependencies");
    }
}
