//! Integration tests for analyzer ordering, retry, fallback and cancellation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use depwise_analysis::{
    AnalysisContext, AnalysisError, AnalysisOrchestrator, Analyzer, AnalyzerRegistry,
    ChangelogAnalysisRequest, ChangelogAnalysisResponse, CompatibilityPredictionRequest,
    CompatibilityPredictionResponse, HeuristicAnalyzer, UpdateClassificationRequest,
    UpdateClassificationResponse, VersionDiffAnalysisRequest, VersionDiffAnalysisResponse,
};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// Analyzer that fails a fixed number of times before answering
struct ScriptedAnalyzer {
    name: String,
    available: bool,
    probe_delay: Duration,
    call_delay: Duration,
    failures: usize,
    error: AnalysisError,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            probe_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
            failures: 0,
            error: AnalysisError::Network("connection refused".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            failures: usize::MAX,
            ..Self::succeeding(name)
        }
    }

    fn fail_then_succeed(name: &str, failures: usize) -> Self {
        Self {
            failures,
            ..Self::succeeding(name)
        }
    }

    fn with_error(mut self, error: AnalysisError) -> Self {
        self.error = error;
        self
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn slow_probe(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    fn slow_call(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn outcome(&self) -> Result<(), AnalysisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        if call < self.failures {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "test"
    }

    async fn is_available(&self) -> bool {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.available
    }

    async fn analyze_changelog(
        &self,
        request: &ChangelogAnalysisRequest,
    ) -> Result<ChangelogAnalysisResponse, AnalysisError> {
        self.outcome().await?;
        let mut response = HeuristicAnalyzer::new().changelog(request);
        response.summary = format!("from {}", self.name);
        Ok(response)
    }

    async fn analyze_version_diff(
        &self,
        request: &VersionDiffAnalysisRequest,
    ) -> Result<VersionDiffAnalysisResponse, AnalysisError> {
        self.outcome().await?;
        let mut response = HeuristicAnalyzer::new().version_diff(request);
        response.summary = format!("from {}", self.name);
        Ok(response)
    }

    async fn predict_compatibility(
        &self,
        request: &CompatibilityPredictionRequest,
    ) -> Result<CompatibilityPredictionResponse, AnalysisError> {
        self.outcome().await?;
        let mut response = HeuristicAnalyzer::new().compatibility(request);
        response.summary = format!("from {}", self.name);
        Ok(response)
    }

    async fn classify_update(
        &self,
        request: &UpdateClassificationRequest,
    ) -> Result<UpdateClassificationResponse, AnalysisError> {
        self.outcome().await?;
        let mut response = HeuristicAnalyzer::new().classification(request);
        response.summary = format!("from {}", self.name);
        Ok(response)
    }
}

fn request() -> ChangelogAnalysisRequest {
    ChangelogAnalysisRequest {
        package_name: "lodash".to_string(),
        from_version: "4.17.20".to_string(),
        to_version: "4.17.21".to_string(),
        changelog: "Fixed prototype pollution in zipObjectDeep".to_string(),
        ..Default::default()
    }
}

fn orchestrator(analyzers: &[Arc<ScriptedAnalyzer>], order: &[&str]) -> AnalysisOrchestrator {
    let mut registry = AnalyzerRegistry::new();
    for analyzer in analyzers {
        registry.register(analyzer.clone());
    }
    AnalysisOrchestrator::new(registry, order[0])
        .with_fallbacks(order[1..].iter().copied())
        .with_max_retries(2)
        .with_retry_delay(Duration::from_millis(1))
        .with_probe_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn test_first_success_wins_and_later_analyzers_are_untouched() {
    let a = Arc::new(ScriptedAnalyzer::failing("a"));
    let b = Arc::new(ScriptedAnalyzer::succeeding("b"));
    let heuristic = Arc::new(ScriptedAnalyzer::succeeding("heuristic"));
    let engine = orchestrator(
        &[a.clone(), b.clone(), heuristic.clone()],
        &["a", "b", "heuristic"],
    );

    let response = engine
        .analyze_changelog(&AnalysisContext::new(), &request())
        .await
        .unwrap();

    assert_eq!(response.summary, "from b");
    assert_eq!(response.package_name, "lodash");
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);
    assert_eq!(heuristic.calls(), 0);
}

#[tokio::test]
async fn test_retries_until_success() {
    let flaky = Arc::new(ScriptedAnalyzer::fail_then_succeed("flaky", 2));
    let engine = orchestrator(&[flaky.clone()], &["flaky"]);

    let response = engine
        .analyze_changelog(&AnalysisContext::new(), &request())
        .await
        .unwrap();

    assert_eq!(response.summary, "from flaky");
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn test_non_retryable_error_moves_to_next_analyzer() {
    let denied = Arc::new(
        ScriptedAnalyzer::failing("denied")
            .with_error(AnalysisError::AuthError("invalid key".to_string())),
    );
    let backup = Arc::new(ScriptedAnalyzer::succeeding("backup"));
    let engine = orchestrator(&[denied.clone(), backup.clone()], &["denied", "backup"]);

    let response = engine
        .classify_update(&AnalysisContext::new(), &UpdateClassificationRequest::default())
        .await
        .unwrap();

    assert_eq!(response.summary, "from backup");
    assert_eq!(denied.calls(), 1);
}

#[tokio::test]
async fn test_unavailable_analyzer_is_skipped() {
    let offline = Arc::new(ScriptedAnalyzer::succeeding("offline").unavailable());
    let slow = Arc::new(ScriptedAnalyzer::succeeding("slow").slow_probe(Duration::from_secs(5)));
    let backup = Arc::new(ScriptedAnalyzer::succeeding("backup"));
    let engine = orchestrator(
        &[offline.clone(), slow.clone(), backup.clone()],
        &["offline", "slow", "backup"],
    );

    let response = engine
        .predict_compatibility(
            &AnalysisContext::new(),
            &CompatibilityPredictionRequest::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.summary, "from backup");
    assert_eq!(offline.calls(), 0);
    assert_eq!(slow.calls(), 0);
}

#[tokio::test]
async fn test_all_failing_reports_exhausted_with_last_error() {
    let a = Arc::new(ScriptedAnalyzer::failing("a"));
    let b = Arc::new(
        ScriptedAnalyzer::failing("b").with_error(AnalysisError::Parse("garbage".to_string())),
    );
    let engine = orchestrator(&[a, b], &["a", "b", "unregistered"]);

    let err = engine
        .analyze_version_diff(&AnalysisContext::new(), &VersionDiffAnalysisRequest::default())
        .await
        .unwrap_err();

    match err {
        AnalysisError::Exhausted { attempted, last } => {
            assert_eq!(attempted, vec!["a".to_string(), "b".to_string()]);
            assert_eq!(*last, AnalysisError::Parse("garbage".to_string()));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_nothing_registered_reports_no_analyzers() {
    let engine = AnalysisOrchestrator::new(AnalyzerRegistry::new(), "openai");
    let err = engine
        .analyze_changelog(&AnalysisContext::new(), &request())
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::NoAnalyzers);
}

#[tokio::test]
async fn test_expired_deadline_returns_before_any_attempt() {
    let a = Arc::new(ScriptedAnalyzer::succeeding("a"));
    let engine = orchestrator(&[a.clone()], &["a"]);
    let ctx = AnalysisContext::with_timeout(Duration::ZERO);

    let err = engine.analyze_changelog(&ctx, &request()).await.unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_deadline_interrupts_retry_delay() {
    let a = Arc::new(ScriptedAnalyzer::failing("a"));
    let backup = Arc::new(ScriptedAnalyzer::succeeding("backup"));
    let engine = orchestrator(&[a.clone(), backup.clone()], &["a", "backup"])
        .with_retry_delay(Duration::from_secs(30));
    let ctx = AnalysisContext::with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = engine.analyze_changelog(&ctx, &request()).await.unwrap_err();

    assert!(err.is_cancellation());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(a.calls(), 1);
    assert_eq!(backup.calls(), 0, "cancellation must not escalate to fallback");
}

#[tokio::test]
async fn test_token_cancels_in_flight_call() {
    let stuck = Arc::new(ScriptedAnalyzer::succeeding("stuck").slow_call(Duration::from_secs(30)));
    let engine = orchestrator(&[stuck.clone()], &["stuck"]);
    let token = CancellationToken::new();
    let ctx = AnalysisContext::with_token(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = engine.analyze_changelog(&ctx, &request()).await.unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err, AnalysisError::Cancelled("cancelled by caller".to_string()));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_shared_orchestrator_serves_concurrent_callers() {
    let mut registry = AnalyzerRegistry::new();
    registry.register(Arc::new(HeuristicAnalyzer::new()));
    let engine = Arc::new(AnalysisOrchestrator::new(registry, "heuristic"));

    let calls = (0..8).map(|i| {
        let engine = Arc::clone(&engine);
        async move {
            let request = ChangelogAnalysisRequest {
                package_name: format!("pkg-{}", i),
                from_version: "1.0.0".to_string(),
                to_version: "2.0.0".to_string(),
                ..Default::default()
            };
            engine
                .analyze_changelog(&AnalysisContext::new(), &request)
                .await
        }
    });

    let results = join_all(calls).await;
    for (i, result) in results.into_iter().enumerate() {
        let response = result.unwrap();
        assert_eq!(response.package_name, format!("pkg-{}", i));
        assert_eq!(response.to_version, "2.0.0");
    }
}

#[test]
fn test_available_analyzers_lists_order_first() {
    let a = Arc::new(ScriptedAnalyzer::succeeding("zeta"));
    let b = Arc::new(ScriptedAnalyzer::succeeding("alpha"));
    let c = Arc::new(ScriptedAnalyzer::succeeding("heuristic"));
    let engine = orchestrator(&[a, b, c], &["zeta", "heuristic"]);

    assert_eq!(
        engine.available_analyzers(),
        vec!["zeta".to_string(), "heuristic".to_string(), "alpha".to_string()]
    );
}
