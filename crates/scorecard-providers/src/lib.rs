//! Network judge clients for scorecard-core.
//!
//! Every client implements [`scorecard_core::JudgeClient`] and reports
//! failures through [`scorecard_core::JudgeError`], so the evaluator's retry
//! policy works the same against any provider.

mod factory;
mod http;
mod lmstudio;
mod ollama;
mod openai;

pub use factory::create_judge;
pub use http::USER_AGENT;
pub use lmstudio::lm_studio;
pub use ollama::OllamaJudge;
pub use openai::ChatCompletionsJudge;
