//! Lenient intermediate shapes decoded from model replies
//!
//! Models drift from the requested schema: numbers arrive as strings, enum
//! values are invented, fields go missing. These shapes accept all of that and
//! the `into_response` conversions map the result onto the canonical model,
//! clamping numbers and defaulting unknown vocabulary.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    heuristic::{compatibility_score, determine_update_type, patterns, scoring},
    models::{
        clamp_unit, ApiChange, ApiChangeKind, BehaviorChange, BreakingChange, BugFix,
        CategoryKind, CategoryWeight, ChangelogAnalysisRequest, ChangelogAnalysisResponse,
        CompatibilityIssue, CompatibilityPredictionRequest, CompatibilityPredictionResponse,
        Deprecation, Feature, MigrationEffort, Priority, RiskAssessment, RiskLevel, SecurityFix,
        UpdateClassificationRequest, UpdateClassificationResponse, UpdateType, Urgency,
        VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
    },
};

/// Confidence assumed when a finding omits one
const DEFAULT_ITEM_CONFIDENCE: f64 = 0.5;

/// Top-level keys a reply shape understands
///
/// A reply carrying none of them (an empty object, an error envelope) is not
/// an analysis and must not decode into an all-defaults response.
pub trait ExpectedFields {
    const FIELDS: &'static [&'static str];
}

/// A number, a numeric string (optionally with a trailing `%`), or nothing
fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            match text.strip_suffix('%') {
                Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0),
                None => text.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Accept a number, a numeric string (optionally with a trailing `%`) or null
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_number))
}

/// Accept a bool or a "true"/"yes"/"false"/"no" string
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Accept a list of strings, a single string, or a list mixing strings and objects
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text_of = |value: Value| -> Option<String> {
        match value {
            Value::String(text) => Some(text),
            Value::Object(map) => ["description", "step", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string)),
            _ => None,
        }
    };
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(text_of).collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text],
        _ => Vec::new(),
    }
    .into_iter()
    .map(|text| text.trim().to_string())
    .filter(|text| !text.is_empty())
    .collect())
}

fn confidence_or_default(value: Option<f64>) -> f64 {
    clamp_unit(value.unwrap_or(DEFAULT_ITEM_CONFIDENCE))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Unstated levels are medium: absence is not evidence of low risk
fn level_or_default(value: Option<&str>) -> RiskLevel {
    value.map(RiskLevel::from_str_lossy).unwrap_or(RiskLevel::Medium)
}

fn update_type_for(raw: Option<&str>, from_version: &str, to_version: &str) -> UpdateType {
    match raw.map(UpdateType::from_str_lossy) {
        Some(UpdateType::Unknown) | None => determine_update_type(from_version, to_version),
        Some(update_type) => update_type,
    }
}

fn summary_or(summary: Option<String>, fallback: impl FnOnce() -> String) -> String {
    non_empty(summary).unwrap_or_else(fallback)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFinding {
    description: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBreakingChange {
    description: Option<String>,
    affected_api: Option<String>,
    migration: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSecurityFix {
    description: Option<String>,
    severity: Option<String>,
    cve_id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    cvss_score: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawDeprecation {
    description: Option<String>,
    replacement: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

/// Changelog analysis as a model reports it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawChangelogAnalysis {
    #[serde(deserialize_with = "lenient_bool")]
    has_breaking_change: Option<bool>,
    breaking_changes: Vec<RawBreakingChange>,
    #[serde(alias = "features")]
    new_features: Vec<RawFinding>,
    bug_fixes: Vec<RawFinding>,
    security_fixes: Vec<RawSecurityFix>,
    deprecations: Vec<RawDeprecation>,
    risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    risk_score: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    summary: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    recommendations: Vec<String>,
}

impl ExpectedFields for RawChangelogAnalysis {
    const FIELDS: &'static [&'static str] = &[
        "has_breaking_change",
        "breaking_changes",
        "new_features",
        "features",
        "bug_fixes",
        "security_fixes",
        "deprecations",
        "risk_level",
        "risk_score",
        "confidence",
        "summary",
        "recommendations",
    ];
}

impl RawChangelogAnalysis {
    pub fn into_response(
        self,
        request: &ChangelogAnalysisRequest,
        analyzer: &str,
    ) -> ChangelogAnalysisResponse {
        let breaking_changes: Vec<BreakingChange> = self
            .breaking_changes
            .into_iter()
            .filter_map(|raw| {
                Some(BreakingChange {
                    description: non_empty(raw.description)?,
                    affected_api: non_empty(raw.affected_api),
                    migration: non_empty(raw.migration),
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect();
        let new_features = self
            .new_features
            .into_iter()
            .filter_map(|raw| {
                Some(Feature {
                    description: non_empty(raw.description)?,
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect::<Vec<_>>();
        let bug_fixes = self
            .bug_fixes
            .into_iter()
            .filter_map(|raw| {
                Some(BugFix {
                    description: non_empty(raw.description)?,
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect::<Vec<_>>();
        let security_fixes = self
            .security_fixes
            .into_iter()
            .filter_map(|raw| {
                Some(SecurityFix {
                    description: non_empty(raw.description)?,
                    severity: level_or_default(raw.severity.as_deref()),
                    // only well-formed identifiers survive
                    cve_id: raw.cve_id.as_deref().and_then(patterns::extract_cve),
                    cvss_score: raw
                        .cvss_score
                        .filter(|score| score.is_finite())
                        .map(|score| score.clamp(0.0, 10.0)),
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect::<Vec<_>>();
        let deprecations = self
            .deprecations
            .into_iter()
            .filter_map(|raw| {
                Some(Deprecation {
                    description: non_empty(raw.description)?,
                    replacement: non_empty(raw.replacement),
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect::<Vec<_>>();

        let risk_level = level_or_default(self.risk_level.as_deref());
        let has_breaking_change =
            !breaking_changes.is_empty() || self.has_breaking_change.unwrap_or(false);
        let summary = summary_or(self.summary, || {
            format!(
                "{} {} -> {}: {} breaking change(s), {} security fix(es), risk {} (via {}).",
                request.package_name,
                request.from_version,
                request.to_version,
                breaking_changes.len(),
                security_fixes.len(),
                risk_level,
                analyzer
            )
        });

        ChangelogAnalysisResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            has_breaking_change,
            breaking_changes,
            new_features,
            bug_fixes,
            security_fixes,
            deprecations,
            risk_level,
            risk_score: self
                .risk_score
                .map(clamp_unit)
                .unwrap_or_else(|| risk_level.score()),
            confidence: confidence_or_default(self.confidence),
            summary,
            recommendations: self.recommendations,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawApiChange {
    #[serde(alias = "change_type", alias = "type")]
    kind: Option<String>,
    #[serde(alias = "name", alias = "api")]
    element: Option<String>,
    description: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    breaking: Option<bool>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBehaviorChange {
    description: Option<String>,
    impact: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

/// Version diff analysis as a model reports it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawVersionDiffAnalysis {
    update_type: Option<String>,
    semantic_impact: Option<String>,
    api_changes: Vec<RawApiChange>,
    behavior_changes: Vec<RawBehaviorChange>,
    risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    risk_score: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    backward_compatible: Option<bool>,
    migration_effort: Option<String>,
    summary: Option<String>,
}

impl ExpectedFields for RawVersionDiffAnalysis {
    const FIELDS: &'static [&'static str] = &[
        "update_type",
        "semantic_impact",
        "api_changes",
        "behavior_changes",
        "risk_level",
        "risk_score",
        "confidence",
        "backward_compatible",
        "migration_effort",
        "summary",
    ];
}

impl RawVersionDiffAnalysis {
    pub fn into_response(
        self,
        request: &VersionDiffAnalysisRequest,
        analyzer: &str,
    ) -> VersionDiffAnalysisResponse {
        let api_changes: Vec<ApiChange> = self
            .api_changes
            .into_iter()
            .filter_map(|raw| {
                let kind = raw
                    .kind
                    .as_deref()
                    .map(ApiChangeKind::from_str_lossy)
                    .unwrap_or_default();
                let element = non_empty(raw.element).or_else(|| non_empty(raw.description.clone()))?;
                Some(ApiChange {
                    breaking: raw
                        .breaking
                        .unwrap_or(matches!(kind, ApiChangeKind::Removed | ApiChangeKind::Renamed)),
                    description: non_empty(raw.description).unwrap_or_else(|| element.clone()),
                    element,
                    kind,
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect();
        let behavior_changes: Vec<BehaviorChange> = self
            .behavior_changes
            .into_iter()
            .filter_map(|raw| {
                Some(BehaviorChange {
                    description: non_empty(raw.description)?,
                    impact: level_or_default(raw.impact.as_deref()),
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect();

        let update_type = update_type_for(
            self.update_type.as_deref(),
            &request.from_version,
            &request.to_version,
        );
        let risk_level = level_or_default(self.risk_level.as_deref());
        let backward_compatible = self
            .backward_compatible
            .unwrap_or_else(|| !api_changes.iter().any(|change| change.breaking));
        let migration_effort = self
            .migration_effort
            .as_deref()
            .map(MigrationEffort::from_str_lossy)
            .unwrap_or_default();
        let semantic_impact = summary_or(self.semantic_impact, || {
            format!("{} update with {} API change(s)", update_type, api_changes.len())
        });
        let summary = summary_or(self.summary, || {
            format!(
                "{} {} -> {}: {} update, {} API change(s), migration effort {} (via {}).",
                request.package_name,
                request.from_version,
                request.to_version,
                update_type,
                api_changes.len(),
                migration_effort,
                analyzer
            )
        });

        VersionDiffAnalysisResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            update_type,
            semantic_impact,
            api_changes,
            behavior_changes,
            risk_level,
            risk_score: self
                .risk_score
                .map(clamp_unit)
                .unwrap_or_else(|| risk_level.score()),
            confidence: confidence_or_default(self.confidence),
            backward_compatible,
            migration_effort,
            summary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCompatibilityIssue {
    description: Option<String>,
    severity: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    likelihood: Option<f64>,
    mitigation: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
}

/// Compatibility prediction as a model reports it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCompatibilityPrediction {
    #[serde(deserialize_with = "lenient_f64")]
    compatibility_score: Option<f64>,
    issues: Vec<RawCompatibilityIssue>,
    #[serde(deserialize_with = "lenient_strings")]
    migration_steps: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    testing_recommendations: Vec<String>,
    risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    summary: Option<String>,
}

impl ExpectedFields for RawCompatibilityPrediction {
    const FIELDS: &'static [&'static str] = &[
        "compatibility_score",
        "issues",
        "migration_steps",
        "testing_recommendations",
        "risk_level",
        "confidence",
        "summary",
    ];
}

impl RawCompatibilityPrediction {
    pub fn into_response(
        self,
        request: &CompatibilityPredictionRequest,
        analyzer: &str,
    ) -> CompatibilityPredictionResponse {
        let issues: Vec<CompatibilityIssue> = self
            .issues
            .into_iter()
            .filter_map(|raw| {
                Some(CompatibilityIssue {
                    description: non_empty(raw.description)?,
                    severity: level_or_default(raw.severity.as_deref()),
                    likelihood: confidence_or_default(raw.likelihood),
                    mitigation: non_empty(raw.mitigation).unwrap_or_default(),
                    confidence: confidence_or_default(raw.confidence),
                })
            })
            .collect();

        let compatibility_score = self.compatibility_score.map(clamp_unit).unwrap_or_else(|| {
            compatibility_score(determine_update_type(
                &request.from_version,
                &request.to_version,
            ))
        });
        let risk_level = level_or_default(self.risk_level.as_deref());
        let summary = summary_or(self.summary, || {
            format!(
                "{} {} -> {}: compatibility score {:.2}, {} potential issue(s) (via {}).",
                request.package_name,
                request.from_version,
                request.to_version,
                compatibility_score,
                issues.len(),
                analyzer
            )
        });

        CompatibilityPredictionResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            compatibility_score,
            issues,
            migration_steps: self.migration_steps,
            testing_recommendations: self.testing_recommendations,
            risk_level,
            confidence: confidence_or_default(self.confidence),
            summary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCategory {
    #[serde(alias = "name")]
    category: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    weight: Option<f64>,
}

/// Categories either as a list of `{category, weight}` or as a `{name: weight}` map
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCategories {
    List(Vec<RawCategory>),
    Map(BTreeMap<String, Value>),
}

impl RawCategories {
    fn into_weights(self) -> Vec<CategoryWeight> {
        let pairs: Vec<(Option<String>, Option<f64>)> = match self {
            RawCategories::List(items) => items
                .into_iter()
                .map(|item| (item.category, item.weight))
                .collect(),
            RawCategories::Map(map) => map
                .into_iter()
                .map(|(name, weight)| (Some(name), lenient_number(&weight)))
                .collect(),
        };

        let mut weights: Vec<CategoryWeight> = Vec::new();
        for (name, weight) in pairs {
            let Some(name) = non_empty(name) else {
                continue;
            };
            let category = CategoryKind::from_str_lossy(&name);
            let weight = confidence_or_default(weight);
            match weights.iter_mut().find(|existing| existing.category == category) {
                Some(existing) => existing.weight = existing.weight.max(weight),
                None => weights.push(CategoryWeight { category, weight }),
            }
        }
        weights
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRiskAssessment {
    level: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    score: Option<f64>,
    #[serde(deserialize_with = "lenient_strings")]
    factors: Vec<String>,
}

/// Update classification as a model reports it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawUpdateClassification {
    update_type: Option<String>,
    priority: Option<String>,
    urgency: Option<String>,
    categories: Option<RawCategories>,
    risk: Option<RawRiskAssessment>,
    /// Some models flatten the assessment into a top-level level
    risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    summary: Option<String>,
}

impl ExpectedFields for RawUpdateClassification {
    const FIELDS: &'static [&'static str] = &[
        "update_type",
        "priority",
        "urgency",
        "categories",
        "risk",
        "risk_level",
        "confidence",
        "summary",
    ];
}

impl RawUpdateClassification {
    pub fn into_response(
        self,
        request: &UpdateClassificationRequest,
        analyzer: &str,
    ) -> UpdateClassificationResponse {
        let update_type = update_type_for(
            self.update_type.as_deref(),
            &request.from_version,
            &request.to_version,
        );
        let priority = self
            .priority
            .as_deref()
            .map(Priority::from_str_lossy)
            .unwrap_or_default();
        let urgency = self
            .urgency
            .as_deref()
            .map(Urgency::from_str_lossy)
            .unwrap_or_default();
        let mut categories = self
            .categories
            .map(RawCategories::into_weights)
            .unwrap_or_default();
        if categories.is_empty() {
            categories.push(scoring::fallback_category());
        }

        let raw_risk = self.risk.unwrap_or_default();
        let level = level_or_default(raw_risk.level.as_deref().or(self.risk_level.as_deref()));
        let risk = RiskAssessment {
            level,
            score: raw_risk
                .score
                .map(clamp_unit)
                .unwrap_or_else(|| level.score()),
            factors: raw_risk.factors,
        };

        let summary = summary_or(self.summary, || {
            format!(
                "{} {} -> {}: {} update, {} priority, {} urgency (via {}).",
                request.package_name,
                request.from_version,
                request.to_version,
                update_type,
                priority,
                urgency,
                analyzer
            )
        });

        UpdateClassificationResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            update_type,
            priority,
            urgency,
            categories,
            risk,
            confidence: confidence_or_default(self.confidence),
            summary,
        }
    }
}
