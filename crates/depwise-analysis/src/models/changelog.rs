//! Changelog analysis request/response

use serde::{Deserialize, Serialize};

use super::RiskLevel;

/// Request to analyze the changelog between two versions of a package
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangelogAnalysisRequest {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    /// Free-text changelog between the two versions
    #[serde(default)]
    pub changelog: String,
    /// Free-text release notes, if published separately
    #[serde(default)]
    pub release_notes: String,
    /// Package manager / ecosystem (e.g. "npm", "pip")
    #[serde(default)]
    pub package_manager: String,
    /// Implementation language of the package
    #[serde(default)]
    pub language: String,
}

impl ChangelogAnalysisRequest {
    /// Changelog and release notes joined into a single body of text
    pub fn combined_text(&self) -> String {
        match (self.changelog.trim(), self.release_notes.trim()) {
            ("", "") => String::new(),
            (changelog, "") => changelog.to_string(),
            ("", notes) => notes.to_string(),
            (changelog, notes) => format!("{}\n\n{}", changelog, notes),
        }
    }
}

/// A change that breaks consumers of the previous version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub description: String,
    /// API or symbol affected, when identifiable
    #[serde(default)]
    pub affected_api: Option<String>,
    /// Suggested migration path
    #[serde(default)]
    pub migration: Option<String>,
    pub confidence: f64,
}

/// A newly introduced capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub description: String,
    pub confidence: f64,
}

/// A corrected defect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugFix {
    pub description: String,
    pub confidence: f64,
}

/// A security-relevant fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFix {
    pub description: String,
    pub severity: RiskLevel,
    /// CVE identifier, only when present in the source material
    #[serde(default)]
    pub cve_id: Option<String>,
    /// CVSS base score, only when present in the source material
    #[serde(default)]
    pub cvss_score: Option<f64>,
    pub confidence: f64,
}

/// A deprecated API or behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deprecation {
    pub description: String,
    /// Replacement to migrate to, if given
    #[serde(default)]
    pub replacement: Option<String>,
    pub confidence: f64,
}

/// Result of a changelog analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogAnalysisResponse {
    pub package_name: String,
    pub from_version: String,
    pub to_version: String,
    pub has_breaking_change: bool,
    pub breaking_changes: Vec<BreakingChange>,
    pub new_features: Vec<Feature>,
    pub bug_fixes: Vec<BugFix>,
    pub security_fixes: Vec<SecurityFix>,
    pub deprecations: Vec<Deprecation>,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl ChangelogAnalysisResponse {
    /// Empty response echoing the request identity
    pub fn for_request(request: &ChangelogAnalysisRequest) -> Self {
        Self {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            has_breaking_change: false,
            breaking_changes: Vec::new(),
            new_features: Vec::new(),
            bug_fixes: Vec::new(),
            security_fixes: Vec::new(),
            deprecations: Vec::new(),
            risk_level: RiskLevel::Low,
            risk_score: RiskLevel::Low.score(),
            confidence: 0.0,
            summary: String::new(),
            recommendations: Vec::new(),
        }
    }

    /// Every per-item confidence in the response
    pub fn item_confidences(&self) -> Vec<f64> {
        self.breaking_changes
            .iter()
            .map(|c| c.confidence)
            .chain(self.new_features.iter().map(|f| f.confidence))
            .chain(self.bug_fixes.iter().map(|f| f.confidence))
            .chain(self.security_fixes.iter().map(|f| f.confidence))
            .chain(self.deprecations.iter().map(|d| d.confidence))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_text_joins_non_empty_parts() {
        let mut request = ChangelogAnalysisRequest {
            changelog: "Fixed bug".to_string(),
            ..Default::default()
        };
        assert_eq!(request.combined_text(), "Fixed bug");

        request.release_notes = "  Added feature ".to_string();
        assert_eq!(request.combined_text(), "Fixed bug\n\nAdded feature");

        request.changelog.clear();
        assert_eq!(request.combined_text(), "Added feature");
    }

    #[test]
    fn test_for_request_echoes_identity() {
        let request = ChangelogAnalysisRequest {
            package_name: "express".to_string(),
            from_version: "4.18.0".to_string(),
            to_version: "5.0.0".to_string(),
            ..Default::default()
        };
        let response = ChangelogAnalysisResponse::for_request(&request);
        assert_eq!(response.package_name, "express");
        assert_eq!(response.from_version, "4.18.0");
        assert_eq!(response.to_version, "5.0.0");
        assert!(response.item_confidences().is_empty());
    }
}
