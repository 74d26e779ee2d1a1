//! LM Studio's local server: OpenAI-compatible under `/v1`, no credentials.

use scorecard_core::{JudgeResult, LlmConfig};

use crate::http::HttpBackend;
use crate::openai::ChatCompletionsJudge;

pub fn lm_studio(config: &LlmConfig) -> JudgeResult<ChatCompletionsJudge> {
    let backend = HttpBackend::new(&config.effective_base_url(), config.api_key())?;
    Ok(ChatCompletionsJudge::with_backend(
        backend,
        "lmstudio",
        "/v1/chat/completions",
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::{JudgeClient, ProviderKind};

    #[test]
    fn defaults_to_local_port_without_key() {
        let config = LlmConfig {
            provider: ProviderKind::LmStudio,
            model_name: "local-model".into(),
            ..LlmConfig::default()
        };
        let judge = lm_studio(&config).unwrap();
        assert_eq!(judge.base_url(), "http://localhost:1234");
        assert_eq!(judge.provider(), "lmstudio");
    }
}
