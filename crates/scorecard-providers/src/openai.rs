//! OpenAI-compatible `chat/completions` judge.
//!
//! Used directly for OpenAI and, with a different path prefix and no key,
//! for LM Studio's local server.

use std::time::Duration;

use async_trait::async_trait;
use scorecard_core::{JudgeClient, JudgeError, JudgeRequest, JudgeResult, LlmConfig, RawJudgment, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::HttpBackend;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Judge speaking the chat-completions protocol.
#[derive(Debug, Clone)]
pub struct ChatCompletionsJudge {
    backend: HttpBackend,
    provider: &'static str,
    endpoint: &'static str,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
    json_mode: bool,
}

impl ChatCompletionsJudge {
    /// OpenAI proper: base URL already ends in `/v1`, bearer key required.
    pub fn openai(config: &LlmConfig) -> JudgeResult<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            JudgeError::configuration("OpenAI requires an API key (set LLM_API_KEY or llm.api_key)")
        })?;
        let backend = HttpBackend::new(&config.effective_base_url(), Some(api_key))?;
        Ok(Self::with_backend(backend, "openai", "/chat/completions", config))
    }

    pub(crate) fn with_backend(
        backend: HttpBackend,
        provider: &'static str,
        endpoint: &'static str,
        config: &LlmConfig,
    ) -> Self {
        Self {
            backend,
            provider,
            endpoint,
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_mode,
        }
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url()
    }
}

#[async_trait]
impl JudgeClient for ChatCompletionsJudge {
    fn provider(&self) -> &str {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &JudgeRequest, timeout: Duration) -> JudgeResult<RawJudgment> {
        let payload = ChatPayload {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.temperature,
            stream: false,
            max_tokens: self.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response: ChatResponse = self.backend.post_json(self.endpoint, &payload, timeout).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| JudgeError::invalid_response("response has no message content"))?;

        debug!(
            provider = self.provider,
            metric = %request.context.metric_name,
            chars = text.len(),
            "chat completion received"
        );

        Ok(RawJudgment {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage: response.usage.map(TokenUsage::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::ProviderKind;

    #[test]
    fn openai_requires_api_key() {
        let config = LlmConfig::default();
        let err = ChatCompletionsJudge::openai(&config).unwrap_err();
        assert!(matches!(err, JudgeError::Configuration { .. }));
    }

    #[test]
    fn openai_uses_default_base_url() {
        let config = LlmConfig {
            provider: ProviderKind::OpenAi,
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let judge = ChatCompletionsJudge::openai(&config).unwrap();
        assert_eq!(judge.base_url(), "https://api.openai.com/v1");
        assert_eq!(judge.provider(), "openai");
        assert_eq!(judge.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn payload_omits_optional_fields() {
        let payload = ChatPayload {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            temperature: 0.3,
            stream: false,
            max_tokens: None,
            response_format: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("response_format").is_none());
        assert_eq!(value["messages"][1]["role"], "user");
    }
}
