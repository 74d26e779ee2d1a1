use std::sync::Arc;

use scorecard_core::{JudgeClient, JudgeResult, LlmConfig, ProviderKind};
use tracing::info;

use crate::lmstudio::lm_studio;
use crate::ollama::OllamaJudge;
use crate::openai::ChatCompletionsJudge;

/// Build the judge selected by `[llm].provider`.
pub fn create_judge(config: &LlmConfig) -> JudgeResult<Arc<dyn JudgeClient>> {
    let judge: Arc<dyn JudgeClient> = match config.provider {
        ProviderKind::OpenAi => Arc::new(ChatCompletionsJudge::openai(config)?),
        ProviderKind::Ollama => Arc::new(OllamaJudge::new(config)?),
        ProviderKind::LmStudio => Arc::new(lm_studio(config)?),
    };
    info!(
        provider = judge.provider(),
        model = judge.model(),
        base_url = %config.effective_base_url(),
        "judge client ready"
    );
    Ok(judge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::JudgeError;

    #[test]
    fn selects_provider_variant() {
        for (provider, label) in [
            (ProviderKind::Ollama, "ollama"),
            (ProviderKind::LmStudio, "lmstudio"),
        ] {
            let config = LlmConfig {
                provider,
                model_name: "llama3".into(),
                ..LlmConfig::default()
            };
            let judge = create_judge(&config).unwrap();
            assert_eq!(judge.provider(), label);
            assert_eq!(judge.model(), "llama3");
        }
    }

    #[test]
    fn openai_without_key_is_a_configuration_error() {
        let config = LlmConfig {
            provider: ProviderKind::OpenAi,
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_judge(&config),
            Err(JudgeError::Configuration { .. })
        ));
    }
}
