//! Property tests for the rule-based analyzer: identity echo, numeric bounds
//! and determinism over arbitrary input

use depwise_analysis::{
    heuristic::determine_update_type, ChangelogAnalysisRequest, CompatibilityPredictionRequest,
    DependencyEdge, DependencyGraph, DependencyInfo, FileChange, FileChangeType,
    HeuristicAnalyzer, ProjectContext, UpdateClassificationRequest, UpdateType,
    VersionDiffAnalysisRequest,
};
use proptest::prelude::*;

fn in_unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn version_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..20, 0u32..20, 0u32..20).prop_map(|(a, b, c)| format!("{}.{}.{}", a, b, c)),
        "[a-z0-9.\\-]{0,12}",
    ]
}

fn changelog_strategy() -> impl Strategy<Value = String> {
    let phrases = prop::sample::select(vec![
        "BREAKING CHANGE: removed the legacy API",
        "Added streaming support",
        "Fixed a crash on empty input",
        "Security: patched XSS vulnerability (CVE-2023-12345, CVSS 7.5)",
        "deprecated foo(), use bar() instead",
        "Improved performance of the parser",
        "Remote code execution exploit fixed",
        "chore: bump dependencies",
    ]);
    prop_oneof![
        prop::collection::vec(phrases, 0..6).prop_map(|lines| lines.join(". ")),
        "\\PC{0,300}",
    ]
}

fn file_change_strategy() -> impl Strategy<Value = FileChange> {
    (
        "[a-z/]{1,20}\\.(rs|ts|py|d\\.ts)",
        prop::sample::select(vec![
            FileChangeType::Added,
            FileChangeType::Modified,
            FileChangeType::Deleted,
            FileChangeType::Renamed,
        ]),
        0u32..2000,
        0u32..2000,
    )
        .prop_map(|(path, change_type, lines_added, lines_removed)| FileChange {
            path,
            change_type,
            lines_added,
            lines_removed,
        })
}

proptest! {
    #[test]
    fn prop_changelog_echo_and_bounds(
        name in "[a-z@/\\-]{0,20}",
        from in version_strategy(),
        to in version_strategy(),
        changelog in changelog_strategy(),
    ) {
        let request = ChangelogAnalysisRequest {
            package_name: name.clone(),
            from_version: from.clone(),
            to_version: to.clone(),
            changelog,
            ..Default::default()
        };
        let response = HeuristicAnalyzer::new().changelog(&request);

        prop_assert_eq!(&response.package_name, &name);
        prop_assert_eq!(&response.from_version, &from);
        prop_assert_eq!(&response.to_version, &to);
        prop_assert!(in_unit(response.confidence));
        prop_assert!(in_unit(response.risk_score));
        prop_assert!(response.item_confidences().into_iter().all(in_unit));
        prop_assert!(!response.summary.is_empty());
        prop_assert_eq!(response.has_breaking_change, !response.breaking_changes.is_empty());
        for fix in &response.security_fixes {
            if let Some(score) = fix.cvss_score {
                prop_assert!((0.0..=10.0).contains(&score));
            }
        }
    }

    #[test]
    fn prop_changelog_is_deterministic(changelog in changelog_strategy()) {
        let request = ChangelogAnalysisRequest {
            package_name: "pkg".to_string(),
            from_version: "1.0.0".to_string(),
            to_version: "1.1.0".to_string(),
            changelog,
            ..Default::default()
        };
        let analyzer = HeuristicAnalyzer::new();
        prop_assert_eq!(analyzer.changelog(&request), analyzer.changelog(&request));
    }

    #[test]
    fn prop_version_diff_bounds(
        from in version_strategy(),
        to in version_strategy(),
        diff in "\\PC{0,200}",
        files in prop::collection::vec(file_change_strategy(), 0..8),
    ) {
        let request = VersionDiffAnalysisRequest {
            package_name: "pkg".to_string(),
            from_version: from.clone(),
            to_version: to.clone(),
            diff,
            file_changes: files,
            ..Default::default()
        };
        let response = HeuristicAnalyzer::new().version_diff(&request);

        prop_assert_eq!(&response.from_version, &from);
        prop_assert_eq!(&response.to_version, &to);
        prop_assert_eq!(response.update_type, determine_update_type(&from, &to));
        prop_assert!(in_unit(response.confidence));
        prop_assert!(in_unit(response.risk_score));
        prop_assert!(response.item_confidences().into_iter().all(in_unit));
        prop_assert!(!response.summary.is_empty());
    }

    #[test]
    fn prop_compatibility_bounds(
        from in version_strategy(),
        to in version_strategy(),
        dependents in prop::collection::vec("[a-z]{1,8}", 0..5),
    ) {
        let graph = DependencyGraph {
            nodes: dependents.clone(),
            edges: dependents
                .iter()
                .map(|from| DependencyEdge { from: from.clone(), to: "target".to_string() })
                .collect(),
        };
        let request = CompatibilityPredictionRequest {
            package_name: "target".to_string(),
            from_version: from,
            to_version: to,
            project: ProjectContext {
                language: "rust".to_string(),
                framework: None,
                dependencies: dependents
                    .iter()
                    .map(|name| DependencyInfo { name: name.clone(), version: "1.0.0".to_string() })
                    .collect(),
            },
            dependency_graph: Some(graph),
        };
        let response = HeuristicAnalyzer::new().compatibility(&request);

        prop_assert_eq!(&response.package_name, "target");
        prop_assert!(in_unit(response.compatibility_score));
        prop_assert!(in_unit(response.confidence));
        prop_assert!(response
            .issues
            .iter()
            .all(|issue| in_unit(issue.likelihood) && in_unit(issue.confidence)));
        prop_assert!(!response.summary.is_empty());
    }

    #[test]
    fn prop_classification_bounds(
        from in version_strategy(),
        to in version_strategy(),
        changelog in changelog_strategy(),
    ) {
        let request = UpdateClassificationRequest {
            package_name: "pkg".to_string(),
            from_version: from,
            to_version: to,
            changelog,
            ..Default::default()
        };
        let response = HeuristicAnalyzer::new().classification(&request);

        prop_assert!(in_unit(response.confidence));
        prop_assert!(in_unit(response.risk.score));
        prop_assert!(!response.categories.is_empty());
        prop_assert!(response.categories.iter().all(|c| in_unit(c.weight)));
        prop_assert!(!response.summary.is_empty());
    }

    #[test]
    fn prop_major_bump_is_major(
        major in 0u32..100,
        minor in 0u32..100,
        patch in 0u32..100,
        bump in 1u32..10,
    ) {
        let from = format!("{}.{}.{}", major, minor, patch);
        let to = format!("{}.0.0", major + bump);
        prop_assert_eq!(determine_update_type(&from, &to), UpdateType::Major);
    }
}
