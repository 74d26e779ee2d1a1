//! Failure taxonomy for a single judge invocation.

use std::time::Duration;

/// Errors a [`JudgeClient`](super::JudgeClient) may return.
///
/// Transient variants are retried by the metric evaluator; see
/// [`JudgeError::is_retryable`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JudgeError {
    #[error("judge call timed out after {}ms", millis(.timeout))]
    Timeout { timeout: Duration },

    #[error("judge provider rate limited the request{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("judge provider error{}: {message}", status_hint(.status))]
    Provider {
        status: Option<u16>,
        message: String,
        retryable: bool,
    },

    #[error("judge provider rejected credentials: {message}")]
    Unauthorized { message: String },

    #[error("judge returned an invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("judge client misconfigured: {message}")]
    Configuration { message: String },
}

impl JudgeError {
    /// Transient failures are worth another attempt; credential and
    /// configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::InvalidResponse { .. } => true,
            Self::Provider { retryable, .. } => *retryable,
            Self::Unauthorized { .. } | Self::Configuration { .. } => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable, lowercase kind label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Provider { .. } => "provider",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Operator-facing hint.
    pub fn troubleshooting(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "the provider is slow or overloaded; raise llm.timeout_secs or retry later",
            Self::RateLimited { .. } => "lower evaluation.max_concurrency or wait before retrying",
            Self::Provider { .. } => "check that the provider service is running and the model name exists",
            Self::Unauthorized { .. } => "check the API key (LLM_API_KEY / OPENAI_API_KEY)",
            Self::InvalidResponse { .. } => "the model did not return the expected JSON; try a more capable model",
            Self::Configuration { .. } => "fix the [llm] section of the configuration",
        }
    }
}

fn millis(timeout: &Duration) -> u128 {
    timeout.as_millis()
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

fn status_hint(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Result type for judge operations.
pub type JudgeResult<T> = std::result::Result<T, JudgeError>;
