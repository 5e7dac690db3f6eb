//! Deterministic, offline rule-based analyzer
//!
//! Reconstructs the same judgments the backend adapters produce using only
//! keyword tables and semantic-version arithmetic. It never touches the network
//! and never fails, which makes it the analyzer of last resort.

use async_trait::async_trait;
use tracing::debug;

use crate::{
    analyzer::{Analyzer, HEURISTIC_ANALYZER},
    error::AnalysisError,
    models::{
        ApiChange, BehaviorChange, ChangelogAnalysisRequest, ChangelogAnalysisResponse,
        CompatibilityIssue, CompatibilityPredictionRequest, CompatibilityPredictionResponse,
        MigrationEffort, Priority, RiskAssessment, RiskLevel, UpdateClassificationRequest,
        UpdateClassificationResponse, UpdateType, Urgency, VersionDiffAnalysisRequest,
        VersionDiffAnalysisResponse,
    },
};

pub mod patterns;
pub mod scoring;
pub mod surface;
pub mod version;

pub use version::{compatibility_score, determine_update_type, parse_version};

use patterns::ScanResult;

/// Removed-line count above which a migration is considered large
const LARGE_REMOVAL_LINES: u64 = 500;

/// Rule-based analyzer registered as `"heuristic"`
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Changelog analysis without the async wrapper
    pub fn changelog(&self, request: &ChangelogAnalysisRequest) -> ChangelogAnalysisResponse {
        let text = request.combined_text();
        let scan = patterns::scan(&text);
        let update_type = determine_update_type(&request.from_version, &request.to_version);

        let risk_level = if text.trim().is_empty() {
            update_type.baseline_risk()
        } else {
            scoring::aggregate_risk(&scan)
        };

        let mut response = ChangelogAnalysisResponse::for_request(request);
        response.has_breaking_change = !scan.breaking_changes.is_empty();
        response.risk_level = risk_level;
        response.risk_score = risk_level.score();
        response.confidence = scoring::shape_confidence(&text, &scan);
        response.recommendations = changelog_recommendations(&scan, update_type, risk_level);
        response.summary = format!(
            "{} {} -> {} ({} update): {} breaking change(s), {} feature(s), {} bug fix(es), \
             {} security fix(es), {} deprecation(s). Risk: {}.",
            display_name(&request.package_name),
            request.from_version,
            request.to_version,
            update_type,
            scan.breaking_changes.len(),
            scan.features.len(),
            scan.bug_fixes.len(),
            scan.security_fixes.len(),
            scan.deprecations.len(),
            risk_level
        );

        response.breaking_changes = scan.breaking_changes;
        response.new_features = scan.features;
        response.bug_fixes = scan.bug_fixes;
        response.security_fixes = scan.security_fixes;
        response.deprecations = scan.deprecations;
        response
    }

    /// Version diff analysis without the async wrapper
    pub fn version_diff(&self, request: &VersionDiffAnalysisRequest) -> VersionDiffAnalysisResponse {
        let update_type = determine_update_type(&request.from_version, &request.to_version);
        let scan = patterns::scan(&request.diff);
        let (lines_added, lines_removed) = request.line_totals();

        let mut api_changes = surface::from_diff(&request.diff);
        for change in surface::from_file_changes(&request.file_changes) {
            if !api_changes.iter().any(|existing| existing.element == change.element) {
                api_changes.push(change);
            }
        }
        let behavior_changes = behavior_changes(&scan);

        let breaking_api = api_changes.iter().any(|change| change.breaking);
        let backward_compatible =
            !breaking_api && scan.breaking_changes.is_empty() && update_type != UpdateType::Major;

        let mut risk_level = update_type.baseline_risk().max(scoring::aggregate_risk(&scan));
        if breaking_api {
            risk_level = risk_level.max(RiskLevel::High);
        }

        let migration_effort = migration_effort(update_type, lines_removed, backward_compatible);

        let mut confidence = scoring::shape_confidence(&request.diff, &scan);
        if !request.file_changes.is_empty() {
            confidence = (confidence + 0.1).min(1.0);
        }

        let semantic_impact = semantic_impact(
            update_type,
            &api_changes,
            lines_added,
            lines_removed,
            request.file_changes.len(),
        );
        let summary = format!(
            "{} {} -> {}: {} update, {} API change(s), {}, migration effort {}.",
            display_name(&request.package_name),
            request.from_version,
            request.to_version,
            update_type,
            api_changes.len(),
            if backward_compatible {
                "backward compatible"
            } else {
                "not backward compatible"
            },
            migration_effort
        );

        VersionDiffAnalysisResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            update_type,
            semantic_impact,
            api_changes,
            behavior_changes,
            risk_level,
            risk_score: risk_level.score(),
            confidence,
            backward_compatible,
            migration_effort,
            summary,
        }
    }

    /// Compatibility prediction without the async wrapper
    pub fn compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> CompatibilityPredictionResponse {
        let package = display_name(&request.package_name);
        let update_type = determine_update_type(&request.from_version, &request.to_version);
        let dependents: Vec<&str> = request
            .dependency_graph
            .as_ref()
            .map(|graph| graph.dependents_of(&request.package_name))
            .unwrap_or_default();
        let related = related_dependencies(request);

        let mut issues = Vec::new();
        match update_type {
            UpdateType::Major => issues.push(CompatibilityIssue {
                description: format!(
                    "Major version change of {} may remove or alter APIs the project uses",
                    package
                ),
                severity: RiskLevel::High,
                likelihood: 0.7,
                mitigation: "Review the migration guide and run the full test suite".to_string(),
                confidence: 0.8,
            }),
            UpdateType::Prerelease => issues.push(CompatibilityIssue {
                description: format!("{} {} is a prerelease and may be unstable", package, request.to_version),
                severity: RiskLevel::Medium,
                likelihood: 0.5,
                mitigation: "Pin the prerelease explicitly and avoid shipping it to production"
                    .to_string(),
                confidence: 0.9,
            }),
            UpdateType::Unknown => issues.push(CompatibilityIssue {
                description: "Version scheme could not be parsed; impact is unknown".to_string(),
                severity: RiskLevel::Medium,
                likelihood: 0.3,
                mitigation: "Inspect the release notes manually".to_string(),
                confidence: 0.3,
            }),
            UpdateType::Minor | UpdateType::Patch => {}
        }

        if !dependents.is_empty() {
            let likelihood = if update_type == UpdateType::Major { 0.5 } else { 0.2 };
            issues.push(CompatibilityIssue {
                description: format!(
                    "{} package(s) depend on {}: {}",
                    dependents.len(),
                    package,
                    dependents.join(", ")
                ),
                severity: if update_type == UpdateType::Major {
                    RiskLevel::High
                } else {
                    RiskLevel::Low
                },
                likelihood,
                mitigation: "Verify the dependents accept the new version range".to_string(),
                confidence: 0.6,
            });
        }

        if !related.is_empty() {
            issues.push(CompatibilityIssue {
                description: format!(
                    "Related packages may need to move together: {}",
                    related.join(", ")
                ),
                severity: RiskLevel::Medium,
                likelihood: 0.4,
                mitigation: "Update related packages in the same change".to_string(),
                confidence: 0.5,
            });
        }

        let mut migration_steps = vec![
            format!("Read the release notes for {} {}", package, request.to_version),
            format!(
                "Update {} from {} to {} in the dependency manifest",
                package, request.from_version, request.to_version
            ),
        ];
        if update_type == UpdateType::Major {
            migration_steps.push("Update call sites affected by removed or changed APIs".to_string());
        }
        if !related.is_empty() {
            migration_steps.push(format!("Align related packages: {}", related.join(", ")));
        }
        migration_steps.push("Reinstall dependencies and regenerate the lockfile".to_string());
        migration_steps.push("Run the test suite".to_string());

        let mut testing_recommendations = vec!["Run the unit test suite".to_string()];
        if matches!(update_type, UpdateType::Major | UpdateType::Prerelease) {
            testing_recommendations.push("Run integration and end-to-end tests".to_string());
        }
        if let Some(framework) = request.project.framework.as_deref().filter(|f| !f.is_empty()) {
            testing_recommendations.push(format!("Smoke-test {} application startup", framework));
        }
        if !dependents.is_empty() {
            testing_recommendations.push(format!(
                "Re-test packages that depend on {}: {}",
                package,
                dependents.join(", ")
            ));
        }

        let risk_level = issues
            .iter()
            .map(|issue| issue.severity)
            .fold(update_type.baseline_risk(), RiskLevel::max);

        let mut confidence: f64 = if update_type == UpdateType::Unknown { 0.3 } else { 0.5 };
        if request.dependency_graph.is_some() {
            confidence += 0.1;
        }

        let compatibility_score = compatibility_score(update_type);
        let summary = format!(
            "{} {} -> {} ({} update) in a {} project: compatibility score {:.2}, {} potential issue(s).",
            package,
            request.from_version,
            request.to_version,
            update_type,
            request.project.describe(),
            compatibility_score,
            issues.len()
        );

        CompatibilityPredictionResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            compatibility_score,
            issues,
            migration_steps,
            testing_recommendations,
            risk_level,
            confidence: confidence.clamp(0.1, 1.0),
            summary,
        }
    }

    /// Update classification without the async wrapper
    pub fn classification(
        &self,
        request: &UpdateClassificationRequest,
    ) -> UpdateClassificationResponse {
        let update_type = determine_update_type(&request.from_version, &request.to_version);
        let scan = patterns::scan(&request.changelog);

        let baseline = update_type.baseline_risk();
        let level = if request.changelog.trim().is_empty() {
            baseline
        } else {
            baseline.max(scoring::aggregate_risk(&scan))
        };

        let priority = derive_priority(update_type, &scan);
        let urgency = derive_urgency(update_type, &scan);
        let categories = scoring::category_weights(&request.changelog);

        let summary = format!(
            "{} {} -> {} is a {} update with {} priority and {} urgency (primary category: {}).",
            display_name(&request.package_name),
            request.from_version,
            request.to_version,
            update_type,
            priority,
            urgency,
            categories
                .iter()
                .max_by(|a, b| a.weight.total_cmp(&b.weight))
                .map(|c| c.category.as_str())
                .unwrap_or("maintenance")
        );

        UpdateClassificationResponse {
            package_name: request.package_name.clone(),
            from_version: request.from_version.clone(),
            to_version: request.to_version.clone(),
            update_type,
            priority,
            urgency,
            categories,
            risk: RiskAssessment {
                level,
                score: level.score(),
                factors: risk_factors(update_type, &scan),
            },
            confidence: scoring::shape_confidence(&request.changelog, &scan),
            summary,
        }
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    fn name(&self) -> &str {
        HEURISTIC_ANALYZER
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        debug!("Heuristic changelog analysis for {}", request.package_name);
        Ok(self.changelog(request))
    }

    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        debug!("Heuristic version diff analysis for {}", request.package_name);
        Ok(self.version_diff(request))
    }

    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        debug!("Heuristic compatibility prediction for {}", request.package_name);
        Ok(self.compatibility(request))
    }

    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        debug!("Heuristic update classification for {}", request.package_name);
        Ok(self.classification(request))
    }
}

fn display_name(package_name: &str) -> &str {
    if package_name.trim().is_empty() {
        "package"
    } else {
        package_name
    }
}

fn changelog_recommendations(
    scan: &ScanResult,
    update_type: UpdateType,
    risk_level: RiskLevel,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    if !scan.security_fixes.is_empty() {
        recommendations.push("Prioritize this update: it addresses security issues".to_string());
    }
    if !scan.breaking_changes.is_empty() {
        recommendations
            .push("Review breaking changes and update affected call sites before upgrading".to_string());
    }
    if !scan.deprecations.is_empty() {
        recommendations.push("Replace deprecated APIs before they are removed".to_string());
    }
    if update_type == UpdateType::Major {
        recommendations.push("Run the full test suite against the new major version".to_string());
    }
    if risk_level == RiskLevel::Low && recommendations.is_empty() {
        recommendations.push("Safe to apply with standard CI validation".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Apply in a branch and run the test suite before merging".to_string());
    }
    recommendations
}

fn behavior_changes(scan: &ScanResult) -> Vec<BehaviorChange> {
    let breaking = scan.breaking_changes.iter().map(|change| BehaviorChange {
        description: change.description.clone(),
        impact: RiskLevel::High,
        confidence: change.confidence,
    });
    let deprecations = scan.deprecations.iter().map(|deprecation| BehaviorChange {
        description: deprecation.description.clone(),
        impact: RiskLevel::Medium,
        confidence: deprecation.confidence,
    });
    let security = scan.security_fixes.iter().map(|fix| BehaviorChange {
        description: fix.description.clone(),
        impact: fix.severity,
        confidence: fix.confidence,
    });
    breaking.chain(deprecations).chain(security).collect()
}

fn migration_effort(
    update_type: UpdateType,
    lines_removed: u64,
    backward_compatible: bool,
) -> MigrationEffort {
    let large = lines_removed > LARGE_REMOVAL_LINES;
    match update_type {
        UpdateType::Major if large => MigrationEffort::High,
        UpdateType::Major => MigrationEffort::Medium,
        UpdateType::Minor | UpdateType::Prerelease if !backward_compatible => MigrationEffort::Medium,
        UpdateType::Minor | UpdateType::Prerelease => MigrationEffort::Low,
        UpdateType::Patch if !backward_compatible => MigrationEffort::Low,
        UpdateType::Patch => MigrationEffort::None,
        UpdateType::Unknown if large || !backward_compatible => MigrationEffort::Medium,
        UpdateType::Unknown => MigrationEffort::Low,
    }
}

fn semantic_impact(
    update_type: UpdateType,
    api_changes: &[ApiChange],
    lines_added: u64,
    lines_removed: u64,
    files: usize,
) -> String {
    let breaking = api_changes.iter().filter(|change| change.breaking).count();
    let headline = match update_type {
        UpdateType::Major => "Major update that may change public behavior",
        UpdateType::Minor => "Minor update adding functionality",
        UpdateType::Patch => "Patch update with limited scope",
        UpdateType::Prerelease => "Prerelease update with unstable surface",
        UpdateType::Unknown => "Update of unknown semantic scope",
    };
    format!(
        "{}; {} API change(s) ({} breaking); {} line(s) added and {} removed across {} file(s)",
        headline,
        api_changes.len(),
        breaking,
        lines_added,
        lines_removed,
        files
    )
}

/// Project dependencies from the same family as the package (same npm scope or name prefix)
fn related_dependencies(request: &CompatibilityPredictionRequest) -> Vec<String> {
    let Some(family) = package_family(&request.package_name) else {
        return Vec::new();
    };
    request
        .project
        .dependencies
        .iter()
        .filter(|dep| dep.name != request.package_name)
        .filter(|dep| package_family(&dep.name) == Some(family))
        .map(|dep| dep.name.clone())
        .collect()
}

fn package_family(name: &str) -> Option<&str> {
    if name.starts_with('@') {
        return name.split_once('/').map(|(scope, _)| scope);
    }
    name.split_once(['-', '_'])
        .map(|(prefix, _)| prefix)
        .filter(|prefix| prefix.len() >= 3)
}

fn derive_priority(update_type: UpdateType, scan: &ScanResult) -> Priority {
    match scan.max_security_severity() {
        Some(RiskLevel::Critical) => Priority::Critical,
        Some(_) => Priority::High,
        None if !scan.breaking_changes.is_empty() => Priority::Medium,
        None => match update_type {
            UpdateType::Major | UpdateType::Minor => Priority::Medium,
            _ => Priority::Low,
        },
    }
}

fn derive_urgency(update_type: UpdateType, scan: &ScanResult) -> Urgency {
    match scan.max_security_severity() {
        Some(RiskLevel::Critical) => Urgency::Immediate,
        Some(_) => Urgency::Urgent,
        None if update_type == UpdateType::Prerelease => Urgency::Low,
        None => Urgency::Normal,
    }
}

fn risk_factors(update_type: UpdateType, scan: &ScanResult) -> Vec<String> {
    let mut factors = Vec::new();
    match update_type {
        UpdateType::Major => factors.push("major version update".to_string()),
        UpdateType::Prerelease => factors.push("prerelease version".to_string()),
        UpdateType::Unknown => factors.push("unparseable version scheme".to_string()),
        UpdateType::Minor | UpdateType::Patch => {}
    }
    if !scan.breaking_changes.is_empty() {
        factors.push(format!(
            "{} breaking change indicator(s)",
            scan.breaking_changes.len()
        ));
    }
    if let Some(severity) = scan.max_security_severity() {
        factors.push(format!("security fixes (highest severity: {})", severity));
    }
    if !scan.deprecations.is_empty() {
        factors.push(format!("{} deprecation(s)", scan.deprecations.len()));
    }
    if factors.is_empty() {
        factors.push("no risk indicators found".to_string());
    }
    factors
}
