//! Error types for the analysis engine

use thiserror::Error;

/// Errors that can occur while analyzing a dependency update
#[derive(Debug, Error, PartialEq, Clone)]
pub enum AnalysisError {
    /// Invalid or missing configuration (fatal at construction time)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure talking to a backend
    #[error("Network error: {0}")]
    Network(String),

    /// Backend request exceeded its transport timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Authentication rejected by the backend (never includes key material)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Backend reply did not contain a well-formed JSON object of the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Analyzer failed its availability probe
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),

    /// Caller cancellation or deadline fired
    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    /// Every analyzer in the effective order failed
    #[error("All analyzers failed (tried: {}): {last}", .attempted.join(", "))]
    Exhausted {
        attempted: Vec<String>,
        last: Box<AnalysisError>,
    },

    /// No registered analyzer appears in the effective order
    #[error("No analyzers available")]
    NoAnalyzers,

    /// Analyzer not found in the registry
    #[error("Analyzer not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Whether this error came from caller cancellation or an expired deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AnalysisError::Cancelled(_))
    }

    /// Whether another attempt (on the same or a different analyzer) may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AnalysisError::Cancelled(_)
                | AnalysisError::Config(_)
                | AnalysisError::AuthError(_)
                | AnalysisError::Exhausted { .. }
                | AnalysisError::NoAnalyzers
        )
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout(err.to_string())
        } else if err.is_connect() {
            AnalysisError::Network(err.to_string())
        } else if err.is_decode() {
            AnalysisError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            AnalysisError::Backend {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}
