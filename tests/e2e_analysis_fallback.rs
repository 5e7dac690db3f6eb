//! End-to-end scenarios: the engine built from configuration keeps answering
//! when every network backend is down

use std::time::Duration;

use depwise_analysis::{
    AnalysisContext, AnalysisError, ChangelogAnalysisRequest, ConfigurationManager,
    EngineConfig, EngineFactory, RiskLevel, UpdateClassificationRequest, UpdateType,
    VersionDiffAnalysisRequest,
};
use tempfile::TempDir;

/// Nothing listens on the discard port
const DEAD_BACKEND: &str = "http://127.0.0.1:9";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn offline_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.analysis.default_analyzer = "openai".to_string();
    config.analysis.fallback_order = vec!["anthropic".to_string(), "ollama".to_string()];
    config.analysis.retry_delay_ms = 1;
    config.analysis.probe_timeout_ms = 500;

    config.openai.api_key = Some("sk-test".to_string());
    config.openai.base_url = Some(DEAD_BACKEND.to_string());
    config.anthropic.api_key = Some("sk-ant-test".to_string());
    config.anthropic.base_url = Some(format!("{}/v1", DEAD_BACKEND));
    config.ollama.base_url = Some(DEAD_BACKEND.to_string());
    config
}

fn breaking_security_request(changelog: &str) -> ChangelogAnalysisRequest {
    ChangelogAnalysisRequest {
        package_name: "left-pad".to_string(),
        from_version: "1.3.0".to_string(),
        to_version: "2.0.0".to_string(),
        changelog: changelog.to_string(),
        package_manager: "npm".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_heuristic_answers_when_all_backends_are_down() {
    init_tracing();
    let engine = EngineFactory::build(&offline_config()).unwrap();
    assert_eq!(
        engine.effective_order(),
        ["openai", "anthropic", "ollama", "heuristic"]
    );

    let request = breaking_security_request(
        "BREAKING CHANGE: removed X. Fixed a security vulnerability (CVE-2024-0001).",
    );
    let ctx = AnalysisContext::with_timeout(Duration::from_secs(30));
    let response = engine.analyze_changelog(&ctx, &request).await.unwrap();

    assert_eq!(response.package_name, "left-pad");
    assert_eq!(response.from_version, "1.3.0");
    assert_eq!(response.to_version, "2.0.0");
    assert!(response.has_breaking_change);
    assert!(response
        .security_fixes
        .iter()
        .any(|fix| fix.cve_id.as_deref() == Some("CVE-2024-0001")));
    assert_eq!(response.risk_level, RiskLevel::High);
}

#[tokio::test]
async fn test_exploit_escalates_to_critical() {
    init_tracing();
    let engine = EngineFactory::build(&offline_config()).unwrap();
    let request = breaking_security_request(
        "BREAKING CHANGE: removed X. Fixed a security vulnerability (CVE-2024-0001) \
         that allowed a remote exploit.",
    );

    let response = engine
        .analyze_changelog(&AnalysisContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.risk_level, RiskLevel::Critical);
}

#[tokio::test]
async fn test_every_operation_falls_back() {
    init_tracing();
    let engine = EngineFactory::build(&offline_config()).unwrap();
    let ctx = AnalysisContext::new();

    let diff = engine
        .analyze_version_diff(
            &ctx,
            &VersionDiffAnalysisRequest {
                package_name: "left-pad".to_string(),
                from_version: "1.3.0".to_string(),
                to_version: "1.4.0".to_string(),
                diff: "-pub fn pad(s: &str) -> String\n+pub fn pad(s: &str, width: usize) -> String"
                    .to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(diff.update_type, UpdateType::Minor);

    let classification = engine
        .classify_update(
            &ctx,
            &UpdateClassificationRequest {
                package_name: "left-pad".to_string(),
                from_version: "1.3.0".to_string(),
                to_version: "1.3.1".to_string(),
                changelog: "Fixed an off-by-one error".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(classification.update_type, UpdateType::Patch);
    assert_eq!(classification.package_name, "left-pad");
}

#[tokio::test]
async fn test_disabled_heuristic_fallback_exhausts() {
    init_tracing();
    let mut config = offline_config();
    config.analysis.enable_heuristic_fallback = false;
    config.analysis.max_retries = 0;
    let engine = EngineFactory::build(&config).unwrap();

    let err = engine
        .analyze_changelog(&AnalysisContext::new(), &breaking_security_request("Fixed a bug"))
        .await
        .unwrap_err();

    match err {
        AnalysisError::Exhausted { attempted, .. } => {
            assert_eq!(attempted, vec!["openai", "anthropic", "ollama"]);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_engine_from_project_config_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
analysis:
  default_analyzer: ollama
  max_retries: 0
  probe_timeout_ms: 300
ollama:
  base_url: "http://127.0.0.1:9"
  model: "qwen2.5-coder:7b"
"#,
    )
    .unwrap();

    let mut manager = ConfigurationManager::with_paths(None, path.clone());
    manager.merge_from_file(&path).unwrap();
    let engine = EngineFactory::build(manager.config()).unwrap();

    assert_eq!(engine.default_analyzer(), "ollama");
    assert_eq!(engine.effective_order(), ["ollama", "heuristic"]);

    let response = engine
        .analyze_changelog(&AnalysisContext::new(), &breaking_security_request(""))
        .await
        .unwrap();
    // no text: risk comes from the major bump alone
    assert_eq!(response.risk_level, RiskLevel::High);
}
