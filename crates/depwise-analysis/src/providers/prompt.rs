//! Prompt rendering shared by every backend adapter
//!
//! Each prompt embeds the request fields plus a literal example of the JSON
//! object the reply must contain.

use crate::models::{
    ChangelogAnalysisRequest, CompatibilityPredictionRequest, UpdateClassificationRequest,
    VersionDiffAnalysisRequest,
};

/// System instruction sent alongside every analysis prompt
pub const SYSTEM_PROMPT: &str = "You are an expert software dependency analyst. You review \
changelogs, diffs and project context to judge the risk of upgrading a dependency. You always \
answer with a single JSON object and nothing else.";

/// Longest free-text field embedded verbatim in a prompt
pub const MAX_EMBEDDED_CHARS: usize = 24_000;

pub const CHANGELOG_SCHEMA: &str = r#"{
  "has_breaking_change": true,
  "breaking_changes": [
    {"description": "Removed the legacy callback API", "affected_api": "connect(cb)", "migration": "Use the promise-based connect()", "confidence": 0.9}
  ],
  "new_features": [{"description": "Added streaming support", "confidence": 0.8}],
  "bug_fixes": [{"description": "Fixed a memory leak in the pool", "confidence": 0.8}],
  "security_fixes": [
    {"description": "Fixed prototype pollution in merge()", "severity": "high", "cve_id": "CVE-2024-0001", "cvss_score": 7.5, "confidence": 0.9}
  ],
  "deprecations": [{"description": "request() is deprecated", "replacement": "fetch()", "confidence": 0.8}],
  "risk_level": "low | medium | high | critical",
  "risk_score": 0.75,
  "confidence": 0.85,
  "summary": "One or two sentences describing the update",
  "recommendations": ["Concrete action for the maintainer"]
}"#;

pub const VERSION_DIFF_SCHEMA: &str = r#"{
  "update_type": "major | minor | patch | prerelease",
  "semantic_impact": "Narrative of how behavior changes for consumers",
  "api_changes": [
    {"kind": "added | removed | modified | renamed", "element": "parse()", "description": "New required options argument", "breaking": true, "confidence": 0.8}
  ],
  "behavior_changes": [{"description": "Defaults to strict mode", "impact": "medium", "confidence": 0.7}],
  "risk_level": "low | medium | high | critical",
  "risk_score": 0.5,
  "confidence": 0.8,
  "backward_compatible": false,
  "migration_effort": "none | low | medium | high",
  "summary": "One or two sentences describing the diff"
}"#;

pub const COMPATIBILITY_SCHEMA: &str = r#"{
  "compatibility_score": 0.8,
  "issues": [
    {"description": "Peer dependency range excludes the project's framework version", "severity": "medium", "likelihood": 0.4, "mitigation": "Upgrade the framework first", "confidence": 0.7}
  ],
  "migration_steps": ["Ordered step one", "Ordered step two"],
  "testing_recommendations": ["What to test after upgrading"],
  "risk_level": "low | medium | high | critical",
  "confidence": 0.8,
  "summary": "One or two sentences on compatibility"
}"#;

pub const CLASSIFICATION_SCHEMA: &str = r#"{
  "update_type": "major | minor | patch | prerelease",
  "priority": "low | medium | high | critical",
  "urgency": "low | normal | urgent | immediate",
  "categories": [
    {"category": "security | feature | bugfix | maintenance | performance", "weight": 0.7}
  ],
  "risk": {"level": "low | medium | high | critical", "score": 0.5, "factors": ["Reason contributing to risk"]},
  "confidence": 0.8,
  "summary": "One or two sentences classifying the update"
}"#;

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none provided)"
    } else {
        text
    }
}

fn or_unknown(text: &str) -> &str {
    if text.trim().is_empty() {
        "unknown"
    } else {
        text
    }
}

/// Keep at most [`MAX_EMBEDDED_CHARS`] characters of `text`
fn bounded(text: &str) -> String {
    match text.char_indices().nth(MAX_EMBEDDED_CHARS) {
        Some((cut, _)) => format!("{}\n[... truncated ...]", &text[..cut]),
        None => text.to_string(),
    }
}

fn respond_with(schema: &str) -> String {
    format!(
        "Respond with ONLY a JSON object in exactly this format (replace the example values; \
         use one of the listed options where alternatives are separated by |):\n{}\n\n\
         Do not include any text outside the JSON object.",
        schema
    )
}

pub fn changelog_prompt(request: &ChangelogAnalysisRequest) -> String {
    format!(
        "Analyze the changelog of the {manager} package \"{name}\" ({language}) for the update \
         from {from} to {to}. Identify breaking changes, new features, bug fixes, security fixes \
         and deprecations. Only report CVE identifiers and CVSS scores that appear in the text.\n\n\
         Changelog:\n{changelog}\n\nRelease notes:\n{notes}\n\n{respond}",
        manager = or_unknown(&request.package_manager),
        name = request.package_name,
        language = or_unknown(&request.language),
        from = request.from_version,
        to = request.to_version,
        changelog = bounded(or_none(&request.changelog)),
        notes = bounded(or_none(&request.release_notes)),
        respond = respond_with(CHANGELOG_SCHEMA),
    )
}

pub fn version_diff_prompt(request: &VersionDiffAnalysisRequest) -> String {
    let files = if request.file_changes.is_empty() {
        "(none provided)".to_string()
    } else {
        request
            .file_changes
            .iter()
            .map(|change| {
                format!(
                    "- {} [{:?}] +{} -{}",
                    change.path, change.change_type, change.lines_added, change.lines_removed
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Analyze the code changes of the {manager} package \"{name}\" ({language}) between \
         {from} and {to}. Describe API changes, behavior changes, backward compatibility and \
         the effort needed to migrate.\n\nChanged files:\n{files}\n\nDiff:\n{diff}\n\n{respond}",
        manager = or_unknown(&request.package_manager),
        name = request.package_name,
        language = or_unknown(&request.language),
        from = request.from_version,
        to = request.to_version,
        files = bounded(&files),
        diff = bounded(or_none(&request.diff)),
        respond = respond_with(VERSION_DIFF_SCHEMA),
    )
}

pub fn compatibility_prompt(request: &CompatibilityPredictionRequest) -> String {
    let dependencies = if request.project.dependencies.is_empty() {
        "(none provided)".to_string()
    } else {
        request
            .project
            .dependencies
            .iter()
            .map(|dep| format!("- {}@{}", dep.name, dep.version))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let graph = match &request.dependency_graph {
        Some(graph) if !graph.edges.is_empty() => graph
            .edges
            .iter()
            .map(|edge| format!("- {} -> {}", edge.from, edge.to))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "(none provided)".to_string(),
    };

    format!(
        "Predict whether updating \"{name}\" from {from} to {to} is compatible with this \
         project.\n\nProject: {project}\n\nDeclared dependencies:\n{dependencies}\n\n\
         Dependency graph edges (dependent -> dependency):\n{graph}\n\n{respond}",
        name = request.package_name,
        from = request.from_version,
        to = request.to_version,
        project = request.project.describe(),
        dependencies = bounded(&dependencies),
        graph = bounded(&graph),
        respond = respond_with(COMPATIBILITY_SCHEMA),
    )
}

pub fn classification_prompt(request: &UpdateClassificationRequest) -> String {
    format!(
        "Classify the update of \"{name}\" from {from} to {to} for a {project} project. Assign a \
         priority, an urgency, relevance weights per category (weights are independent, they do \
         not need to sum to 1) and a risk assessment.\n\nChangelog:\n{changelog}\n\n{respond}",
        name = request.package_name,
        from = request.from_version,
        to = request.to_version,
        project = request.project.describe(),
        changelog = bounded(or_none(&request.changelog)),
        respond = respond_with(CLASSIFICATION_SCHEMA),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileChange, FileChangeType};

    #[test]
    fn test_schemas_are_valid_json() {
        for schema in [
            CHANGELOG_SCHEMA,
            VERSION_DIFF_SCHEMA,
            COMPATIBILITY_SCHEMA,
            CLASSIFICATION_SCHEMA,
        ] {
            let value: serde_json::Value = serde_json::from_str(schema).unwrap();
            assert!(value.is_object());
        }
    }

    #[test]
    fn test_changelog_prompt_embeds_request() {
        let request = ChangelogAnalysisRequest {
            package_name: "axios".to_string(),
            from_version: "0.27.2".to_string(),
            to_version: "1.0.0".to_string(),
            changelog: "Dropped support for IE11".to_string(),
            package_manager: "npm".to_string(),
            ..Default::default()
        };

        let prompt = changelog_prompt(&request);
        assert!(prompt.contains("\"axios\""));
        assert!(prompt.contains("from 0.27.2 to 1.0.0"));
        assert!(prompt.contains("Dropped support for IE11"));
        assert!(prompt.contains("Release notes:\n(none provided)"));
        assert!(prompt.contains("\"has_breaking_change\""));
    }

    #[test]
    fn test_diff_prompt_lists_files() {
        let request = VersionDiffAnalysisRequest {
            package_name: "parser".to_string(),
            from_version: "1.0.0".to_string(),
            to_version: "1.1.0".to_string(),
            file_changes: vec![FileChange {
                path: "src/index.ts".to_string(),
                change_type: FileChangeType::Deleted,
                lines_added: 0,
                lines_removed: 12,
            }],
            ..Default::default()
        };
        let prompt = version_diff_prompt(&request);
        assert!(prompt.contains("- src/index.ts [Deleted] +0 -12"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let text = "x".repeat(MAX_EMBEDDED_CHARS + 10);
        let bounded = bounded(&text);
        assert!(bounded.ends_with("[... truncated ...]"));
        assert!(bounded.len() < text.len() + 30);
    }
}
