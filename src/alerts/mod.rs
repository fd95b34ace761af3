pub mod rollback;
pub mod slack;

use async_trait::async_trait;
use serde::Serialize;

/// Result of one outbound side effect. Failures are recorded here rather
/// than returned as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub attempted: bool,
    pub succeeded: bool,
    pub detail: String,
}

impl DispatchOutcome {
    /// The action was not attempted (missing configuration or unusable input).
    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            attempted: false,
            succeeded: false,
            detail: detail.into(),
        }
    }

    pub fn delivered(detail: impl Into<String>) -> Self {
        Self {
            attempted: true,
            succeeded: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            attempted: true,
            succeeded: false,
            detail: detail.into(),
        }
    }

    /// Build an outcome from a completed HTTP exchange.
    pub(crate) fn from_status(status: reqwest::StatusCode, expected: reqwest::StatusCode) -> Self {
        if status == expected {
            Self::delivered(format!("HTTP {}", status.as_u16()))
        } else {
            Self::failed(format!(
                "unexpected HTTP {} (expected {})",
                status.as_u16(),
                expected.as_u16()
            ))
        }
    }

    /// Build an outcome from a transport-level failure.
    pub(crate) fn from_transport_error(error: &reqwest::Error, timeout: std::time::Duration) -> Self {
        if error.is_timeout() {
            Self::failed(format!("timed out after {}s", timeout.as_secs_f64()))
        } else if error.is_connect() {
            Self::failed(format!("connection failed: {error}"))
        } else {
            Self::failed(format!("request failed: {error}"))
        }
    }
}

/// Sends a chat message about a failed pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether a destination is configured.
    fn is_configured(&self) -> bool;

    async fn notify(&self, message: &str) -> DispatchOutcome;
}

/// Asks the source-hosting platform to start a rollback for a repository.
#[async_trait]
pub trait RollbackTrigger: Send + Sync {
    /// Whether a credential is configured.
    fn is_configured(&self) -> bool;

    /// Called for every failure; a missing repository is reported in the
    /// outcome without any request being made.
    async fn trigger_rollback(
        &self,
        repository_full_name: Option<&str>,
        reason: &str,
    ) -> DispatchOutcome;
}
