//! Caller-supplied cancellation and deadline for analysis calls

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;

/// Cancellation signal observed at every blocking point of an analysis call
///
/// A context fires when its token is cancelled or its deadline passes.
/// Clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl AnalysisContext {
    /// Context that never expires on its own
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// Context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new().deadline(deadline)
    }

    /// Context bound to an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set or tighten the deadline
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// The deadline, if any
    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` if no deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and every clone of it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the token fired or the deadline passed
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once the token fires or the deadline passes
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// `Err(Cancelled)` if the context already fired
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(self.cancellation_error())
        } else {
            Ok(())
        }
    }

    /// The error reported when this context fires
    pub fn cancellation_error(&self) -> AnalysisError {
        if self.token.is_cancelled() {
            AnalysisError::Cancelled("cancelled by caller".to_string())
        } else {
            AnalysisError::Cancelled("deadline exceeded".to_string())
        }
    }

    /// Run `future` unless the context fires first
    pub async fn run<F, T>(&self, future: F) -> Result<T, AnalysisError>
    where
        F: std::future::Future<Output = Result<T, AnalysisError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.cancellation_error()),
            result = future => result,
        }
    }

    /// Sleep for `delay` unless the context fires first
    pub async fn sleep(&self, delay: Duration) -> Result<(), AnalysisError> {
        self.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_deadline_is_cancelled() {
        let ctx = AnalysisContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(ctx.is_cancelled());
        assert_eq!(
            ctx.check(),
            Err(AnalysisError::Cancelled("deadline exceeded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_clones() {
        let ctx = AnalysisContext::new();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(
            clone.check(),
            Err(AnalysisError::Cancelled("cancelled by caller".to_string()))
        );
    }

    #[tokio::test]
    async fn test_sleep_returns_early_on_deadline() {
        let ctx = AnalysisContext::with_timeout(Duration::from_millis(20));
        let started = std::time::Instant::now();
        let result = ctx.sleep(Duration::from_secs(10)).await;
        assert!(matches!(result, Err(AnalysisError::Cancelled(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_run_completes_when_not_cancelled() {
        let ctx = AnalysisContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run(async { Ok::<_, AnalysisError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[test]
    fn test_deadline_only_tightens() {
        let now = Instant::now();
        let ctx = AnalysisContext::with_deadline(now + Duration::from_secs(1))
            .deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline_at(), Some(now + Duration::from_secs(1)));
    }
}
