//! Configuration model: TOML file first, environment overrides second.
//!
//! Nothing in the coordinator or evaluator reads configuration on its own.
//! Front ends build a [`ScorecardConfig`], validate it, and inject the derived
//! [`CoordinatorConfig`], [`RetryPolicy`] and [`JudgeLimiter`] at construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;
use crate::evaluator::{EvaluatorConfig, RetryPolicy, DEFAULT_MAX_PROMPT_CHARS};
use crate::judge::JudgeLimiter;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("unknown provider '{0}' (expected openai, ollama or lmstudio)")]
    UnknownProvider(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which judge implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "lmstudio")]
    LmStudio,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
            Self::LmStudio => "http://localhost:1234",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" | "lm_studio" | "lm-studio" => Ok(Self::LmStudio),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// `[llm]`: provider selection and call parameters.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f64,
    /// Upper bound for one judge call, in seconds.
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask OpenAI-compatible servers for a JSON object response.
    pub json_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model_name: "gpt-3.5-turbo".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.3,
            timeout_secs: 60,
            max_tokens: None,
            json_mode: true,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("json_mode", &self.json_mode)
            .finish()
    }
}

impl LlmConfig {
    /// Configured base URL, or the provider default, without a trailing slash.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// `[app]`: collaborator locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub guidelines_path: PathBuf,
    pub reports_dir: PathBuf,
    pub samples_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            guidelines_path: PathBuf::from("guidelines.yaml"),
            reports_dir: PathBuf::from("reports"),
            samples_path: PathBuf::from("samples.yaml"),
        }
    }
}

/// `[evaluation]`: concurrency, retry and content limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Metric tasks in flight per submission.
    pub max_concurrency: usize,
    /// Judge calls in flight across the whole process.
    pub max_in_flight_calls: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub max_prompt_chars: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let coordinator = CoordinatorConfig::default();
        Self {
            max_concurrency: coordinator.max_concurrency,
            max_in_flight_calls: 8,
            max_retries: retry.max_retries,
            base_delay_ms: retry.base_delay_ms,
            max_delay_ms: retry.max_delay_ms,
            min_content_length: coordinator.min_content_length,
            max_content_length: coordinator.max_content_length,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardConfig {
    pub llm: LlmConfig,
    pub app: AppConfig,
    pub evaluation: EvaluationSettings,
}

impl ScorecardConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Read `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// [`load`](Self::load) then [`apply_env`](Self::apply_env).
    pub fn from_sources<F>(path: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load(path)?;
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is usually `|k| std::env::var(k).ok()`;
    /// empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(model) = get("LLM_MODEL_NAME") {
            self.llm.model_name = model;
        }
        if let Some(key) = get("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        } else if self.llm.provider == ProviderKind::OpenAi && self.llm.api_key().is_none() {
            if let Some(key) = get("OPENAI_API_KEY") {
                self.llm.api_key = Some(key);
            }
        }

        let provider_url = match self.llm.provider {
            ProviderKind::OpenAi => None,
            ProviderKind::Ollama => get("OLLAMA_BASE_URL"),
            ProviderKind::LmStudio => get("LMSTUDIO_BASE_URL"),
        };
        if let Some(url) = get("LLM_BASE_URL").or(provider_url) {
            self.llm.base_url = Some(url);
        }

        if let Some(value) = get("LLM_TEMPERATURE") {
            self.llm.temperature = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "LLM_TEMPERATURE",
                value: value.clone(),
            })?;
        }
        if let Some(path) = get("GUIDELINES_PATH") {
            self.app.guidelines_path = PathBuf::from(path);
        }
        if let Some(dir) = get("REPORTS_DIR") {
            self.app.reports_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Collect every problem instead of stopping at the first.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut problems = Vec::new();
        let llm = &self.llm;
        let eval = &self.evaluation;

        if llm.provider.requires_api_key() && llm.api_key().is_none() {
            problems.push(format!(
                "llm.api_key is required for the {} provider (set LLM_API_KEY or OPENAI_API_KEY)",
                llm.provider
            ));
        }
        if llm.model_name.trim().is_empty() {
            problems.push("llm.model_name must not be empty".to_string());
        }
        let base_url = llm.effective_base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            problems.push(format!("llm.base_url '{base_url}' must be an http(s) URL"));
        }
        if !(0.0..=2.0).contains(&llm.temperature) {
            problems.push(format!(
                "llm.temperature must be between 0 and 2, got {}",
                llm.temperature
            ));
        }
        if llm.timeout_secs == 0 {
            problems.push("llm.timeout_secs must be positive".to_string());
        }
        if eval.max_concurrency == 0 {
            problems.push("evaluation.max_concurrency must be positive".to_string());
        }
        if eval.max_in_flight_calls == 0 {
            problems.push("evaluation.max_in_flight_calls must be positive".to_string());
        }
        if eval.base_delay_ms > eval.max_delay_ms {
            problems.push("evaluation.base_delay_ms exceeds evaluation.max_delay_ms".to_string());
        }
        if eval.min_content_length > eval.max_content_length {
            problems.push(
                "evaluation.min_content_length exceeds evaluation.max_content_length".to_string(),
            );
        }
        if eval.max_prompt_chars == 0 {
            problems.push("evaluation.max_prompt_chars must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.evaluation.max_retries,
            base_delay_ms: self.evaluation.base_delay_ms,
            max_delay_ms: self.evaluation.max_delay_ms,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_concurrency: self.evaluation.max_concurrency,
            min_content_length: self.evaluation.min_content_length,
            max_content_length: self.evaluation.max_content_length,
            evaluator: EvaluatorConfig {
                call_timeout: self.llm.timeout(),
                retry: self.retry_policy(),
                max_prompt_chars: self.evaluation.max_prompt_chars,
            },
        }
    }

    /// A fresh process-wide limiter sized from `[evaluation]`.
    pub fn judge_limiter(&self) -> JudgeLimiter {
        JudgeLimiter::new(self.evaluation.max_in_flight_calls)
    }

    /// TOML with secrets removed, for `config show` and `config init`.
    pub fn to_toml_redacted(&self) -> ConfigResult<String> {
        let mut redacted = self.clone();
        if redacted.llm.api_key.is_some() {
            redacted.llm.api_key = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ScorecardConfig::from_toml_str(
            r#"
[llm]
provider = "ollama"
model_name = "llama3"

[evaluation]
max_concurrency = 2
"#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.evaluation.max_concurrency, 2);
        assert_eq!(config.evaluation.max_retries, 2);
        assert_eq!(config.app.reports_dir, PathBuf::from("reports"));
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScorecardConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ScorecardConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nprovider = ").unwrap();
        assert!(matches!(
            ScorecardConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ScorecardConfig::default();
        config.llm.model_name = "from-file".to_string();
        config
            .apply_env(env(&[
                ("LLM_PROVIDER", "lmstudio"),
                ("LLM_MODEL_NAME", "qwen2.5-7b"),
                ("LMSTUDIO_BASE_URL", "http://gpu-box:1234/"),
                ("LLM_TEMPERATURE", "0.7"),
                ("REPORTS_DIR", "/tmp/out"),
            ]))
            .unwrap();
        assert_eq!(config.llm.provider, ProviderKind::LmStudio);
        assert_eq!(config.llm.model_name, "qwen2.5-7b");
        assert_eq!(config.llm.effective_base_url(), "http://gpu-box:1234");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.app.reports_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn openai_key_fallback_and_precedence() {
        let mut config = ScorecardConfig::default();
        config
            .apply_env(env(&[("OPENAI_API_KEY", "sk-openai")]))
            .unwrap();
        assert_eq!(config.llm.api_key(), Some("sk-openai"));

        let mut config = ScorecardConfig::default();
        config
            .apply_env(env(&[("OPENAI_API_KEY", "sk-openai"), ("LLM_API_KEY", "sk-llm")]))
            .unwrap();
        assert_eq!(config.llm.api_key(), Some("sk-llm"));
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = ScorecardConfig::default();
        assert!(matches!(
            config.apply_env(env(&[("LLM_TEMPERATURE", "warm")])),
            Err(ConfigError::InvalidEnv { var: "LLM_TEMPERATURE", .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[("LLM_PROVIDER", "bard")])),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = ScorecardConfig::default();
        config.llm.temperature = 3.0;
        config.evaluation.max_concurrency = 0;
        config.evaluation.min_content_length = 10;
        config.evaluation.max_content_length = 5;

        match config.validate() {
            Err(ConfigError::Invalid(problems)) => {
                assert_eq!(problems.len(), 4, "{problems:?}");
                assert!(problems.iter().any(|p| p.contains("api_key")));
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn local_providers_need_no_key() {
        let mut config = ScorecardConfig::default();
        config.llm.provider = ProviderKind::Ollama;
        config.validate().expect("ollama config is valid without a key");
    }

    #[test]
    fn derived_values_follow_settings() {
        let mut config = ScorecardConfig::default();
        config.llm.timeout_secs = 5;
        config.evaluation.max_in_flight_calls = 3;
        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.evaluator.call_timeout, Duration::from_secs(5));
        assert_eq!(coordinator.evaluator.retry, config.retry_policy());
        assert_eq!(config.judge_limiter().max_in_flight(), 3);
    }

    #[test]
    fn redacted_toml_hides_api_key() {
        let mut config = ScorecardConfig::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let text = config.to_toml_redacted().unwrap();
        assert!(!text.contains("sk-secret"));
        assert!(ScorecardConfig::from_toml_str(&text).is_ok());
        assert!(!format!("{:?}", config.llm).contains("sk-secret"));
    }
}
