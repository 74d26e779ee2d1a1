//! Ollama's native `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use scorecard_core::{JudgeClient, JudgeError, JudgeRequest, JudgeResult, LlmConfig, RawJudgment, TokenUsage};
use serde::{Deserialize, Serialize};

use crate::http::HttpBackend;

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct OllamaJudge {
    backend: HttpBackend,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
    json_mode: bool,
}

impl OllamaJudge {
    pub fn new(config: &LlmConfig) -> JudgeResult<Self> {
        Ok(Self {
            backend: HttpBackend::new(&config.effective_base_url(), config.api_key())?,
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_mode,
        })
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url()
    }
}

#[async_trait]
impl JudgeClient for OllamaJudge {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &JudgeRequest, timeout: Duration) -> JudgeResult<RawJudgment> {
        let payload = GeneratePayload {
            model: &self.model,
            system: &request.system_prompt,
            prompt: &request.user_prompt,
            stream: false,
            format: self.json_mode.then_some("json"),
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response: GenerateResponse = self.backend.post_json("/api/generate", &payload, timeout).await?;
        if response.response.trim().is_empty() {
            return Err(JudgeError::invalid_response("ollama returned an empty response"));
        }

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt.zip(completion).map(|(p, c)| p + c),
            }),
        };

        Ok(RawJudgment {
            text: response.response,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }
}
