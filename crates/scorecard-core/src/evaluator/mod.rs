//! Single-metric evaluation: render, invoke, decode, retry.
//!
//! [`MetricEvaluator::evaluate`] never fails. Once its retry budget is spent it
//! returns a [`MetricResult`] with a `Failed` status, zero confidence and no
//! score, so one bad metric cannot abort a whole submission.

mod decode;
mod prompt;
mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::domain::{Metric, MetricResult, MetricStatus, Result, ScorecardError};
use crate::judge::{JudgeClient, JudgeError, JudgeLimiter, JudgeRequest, JudgeResult};
use crate::metrics::METRICS;
use crate::obs;

pub use decode::{completeness_confidence, decode_judgment, DecodeError, Judgment};
pub use prompt::{truncate_for_prompt, PromptTemplate, DEFAULT_MAX_PROMPT_CHARS, TRUNCATION_MARKER};
pub use retry::RetryPolicy;

/// Per-call limits applied by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    /// Upper bound on one judge invocation.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_prompt_chars: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }
}

/// Evaluates exactly one metric per call against a shared judge.
#[derive(Clone)]
pub struct MetricEvaluator {
    judge: Arc<dyn JudgeClient>,
    limiter: JudgeLimiter,
    template: Arc<PromptTemplate>,
    config: EvaluatorConfig,
}

impl std::fmt::Debug for MetricEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricEvaluator")
            .field("provider", &self.judge.provider())
            .field("model", &self.judge.model())
            .field("limiter", &self.limiter)
            .field("config", &self.config)
            .finish()
    }
}

impl MetricEvaluator {
    pub fn new(judge: Arc<dyn JudgeClient>, limiter: JudgeLimiter, config: EvaluatorConfig) -> Self {
        Self {
            judge,
            limiter,
            template: Arc::new(PromptTemplate::default()),
            config,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Arc::new(template);
        self
    }

    pub fn judge(&self) -> &Arc<dyn JudgeClient> {
        &self.judge
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `metric` for `content`, folding any failure into the result.
    pub async fn evaluate(&self, content: &str, metric: &Metric) -> MetricResult {
        match self.try_evaluate(content, metric).await {
            Ok(result) => result,
            Err(e) => {
                let reason = match e {
                    ScorecardError::MetricEvaluationFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                METRICS.inc_metric_failures();
                obs::emit_metric_failed(&metric.name, &reason);
                MetricResult::failed(metric.clone(), reason)
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate) but reports exhaustion as
    /// [`ScorecardError::MetricEvaluationFailed`].
    #[instrument(skip(self, content), fields(metric = %metric.name, category = %metric.category))]
    pub async fn try_evaluate(&self, content: &str, metric: &Metric) -> Result<MetricResult> {
        if content.trim().is_empty() {
            return Err(failed(metric, "content is empty"));
        }

        let request = self
            .template
            .render(content, metric, self.config.max_prompt_chars);
        let attempts = self.config.retry.max_attempts();
        let started = Instant::now();

        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Ok(judgment) => {
                    obs::emit_metric_evaluated(
                        &metric.name,
                        judgment.score,
                        attempt + 1,
                        started.elapsed().as_millis() as u64,
                    );
                    return Ok(MetricResult {
                        metric: metric.clone(),
                        score: Some(judgment.score),
                        reasoning: judgment.reasoning,
                        improvement_advice: judgment.improvement_advice,
                        positive_examples: judgment.positive_examples,
                        improvement_examples: judgment.improvement_examples,
                        confidence: judgment.confidence,
                        status: MetricStatus::Ok,
                    });
                }
                Err(error) => {
                    let last = attempt + 1 >= attempts;
                    if last || !error.is_retryable() {
                        debug!(attempts = attempt + 1, kind = error.kind(), "giving up on metric");
                        return Err(failed(metric, error.to_string()));
                    }
                    let delay = self.config.retry.backoff(attempt, &error);
                    METRICS.inc_judge_retries();
                    obs::emit_judge_retry(&metric.name, attempt + 1, delay, &error);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One bounded judge call under a limiter permit, then a strict decode.
    async fn attempt(&self, request: &JudgeRequest) -> JudgeResult<Judgment> {
        let raw = {
            let _permit = self.limiter.acquire().await?;
            METRICS.inc_judge_calls();
            let timeout = self.config.call_timeout;
            match tokio::time::timeout(timeout, self.judge.invoke(request, timeout)).await {
                Ok(result) => result?,
                Err(_) => return Err(JudgeError::Timeout { timeout }),
            }
        };
        decode_judgment(&raw.text)
            .map_err(|e| JudgeError::invalid_response(format!("could not decode judgment: {e}")))
    }
}

fn failed(metric: &Metric, reason: impl Into<String>) -> ScorecardError {
    ScorecardError::MetricEvaluationFailed {
        metric: metric.name.clone(),
        reason: reason.into(),
    }
}
