//! Error types for the financial agent orchestrator
//!
//! Only the components themselves see these errors. Every failure is absorbed
//! into a zero score or a fallback message before it reaches `handle_query`.

use std::any::Any;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // External Call Failures
    // =============================

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailure { stage: &'static str, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentError {
    /// True for failures the caller may see again on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Timeout(_) | AgentError::Unreachable(_))
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not report the configured limit
            AgentError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            AgentError::MalformedOutput(e.to_string())
        } else {
            AgentError::Unreachable(e.to_string())
        }
    }
}

impl From<sqlx::Error> for AgentError {
    fn from(e: sqlx::Error) -> Self {
        AgentError::PersistenceFailure(e.to_string())
    }
}

/// Run a fallible external call under a deadline.
///
/// On expiry the inner future is dropped (cancelling any in-flight request)
/// and `AgentError::Timeout` is returned.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(limit)),
    }
}

/// Readable message from a caught panic payload
pub fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
