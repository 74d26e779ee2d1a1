//! The judge capability: send one metric-scoped prompt, receive text.
//!
//! Providers (OpenAI-compatible, Ollama, LM Studio, test stubs) implement
//! [`JudgeClient`]. The variant is chosen once at construction time; nothing
//! in the core inspects which provider it is talking to.

mod error;
mod limiter;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{JudgeError, JudgeResult};
pub use limiter::JudgeLimiter;

/// What the judge is asked to look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub content: String,
    pub metric_name: String,
    pub metric_description: String,
    pub category: String,
}

/// A fully rendered judge request for exactly one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    pub context: PromptContext,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Unparsed judge output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawJudgment {
    pub text: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

impl RawJudgment {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            usage: None,
        }
    }
}

/// Outcome of a connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionCheck {
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}

/// Language-model judge.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Provider label, e.g. `openai`.
    fn provider(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Run one judge call. Implementations must give up after `timeout`
    /// and report [`JudgeError::Timeout`].
    async fn invoke(&self, request: &JudgeRequest, timeout: Duration) -> JudgeResult<RawJudgment>;

    /// Tiny round-trip proving the provider is reachable and the credentials work.
    async fn check_connection(&self, timeout: Duration) -> JudgeResult<ConnectionCheck> {
        let request = JudgeRequest {
            context: PromptContext {
                content: "ping".to_string(),
                metric_name: "connectivity".to_string(),
                metric_description: "connection check".to_string(),
                category: "system".to_string(),
            },
            system_prompt: "You are a connectivity check. Answer with the single word OK.".to_string(),
            user_prompt: "Reply with OK.".to_string(),
        };
        let started = Instant::now();
        let response = self.invoke(&request, timeout).await?;
        if response.text.trim().is_empty() {
            return Err(JudgeError::invalid_response("empty reply to connection check"));
        }
        Ok(ConnectionCheck {
            provider: self.provider().to_string(),
            model: response.model,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
