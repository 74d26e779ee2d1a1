//! Submission orchestration: validate, fan out one task per metric, fan in,
//! aggregate.
//!
//! Fan-out is bounded twice. A per-submission semaphore caps how many metric
//! tasks run at once, and the evaluator's [`JudgeLimiter`] caps in-flight judge
//! calls across every submission in the process.
//!
//! Cancellation is cooperative through [`CancellationToken`]. A cancelled
//! evaluation aborts its outstanding tasks (dropping their judge futures) and
//! yields [`ScorecardError::Cancelled`]; completed metrics are discarded.
//!
//! Callers that want to follow a running evaluation pass a [`ProgressSink`];
//! it is called once per finished metric, in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{instrument, warn, Instrument};

use crate::aggregate::aggregate;
use crate::domain::{
    EvaluationMetadata, EvaluationResult, MetricResult, Result, ScorecardError,
};
use crate::evaluator::{EvaluatorConfig, MetricEvaluator};
use crate::guidelines::GuidelinesModel;
use crate::identity::fingerprint;
use crate::judge::{JudgeClient, JudgeLimiter};
use crate::metrics::METRICS;
use crate::obs::{self, EvaluationSpan};

/// Submission-level limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Metric tasks allowed to run at once for one submission.
    pub max_concurrency: usize,
    /// Minimum length, in characters, of the trimmed content.
    pub min_content_length: usize,
    /// Maximum length, in characters, of the submitted content.
    pub max_content_length: usize,
    pub evaluator: EvaluatorConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            min_content_length: 1,
            max_content_length: 200_000,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

/// One finished metric within a running evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationProgress {
    /// Metrics finished so far, including this one.
    pub completed: usize,
    pub requested: usize,
    pub metric: String,
    /// False when the metric finished without a score.
    pub scored: bool,
}

/// Receives [`EvaluationProgress`] events from the fan-in loop.
pub type ProgressSink = Arc<dyn Fn(EvaluationProgress) + Send + Sync>;

/// Cloneable cancel signal backed by a `watch` channel.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Turns one content submission into a weighted [`EvaluationResult`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    evaluator: MetricEvaluator,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(judge: Arc<dyn JudgeClient>, limiter: JudgeLimiter, config: CoordinatorConfig) -> Self {
        let evaluator = MetricEvaluator::new(judge, limiter, config.evaluator.clone());
        Self { evaluator, config }
    }

    /// Use a pre-built evaluator (custom prompt template, shared limiter).
    pub fn with_evaluator(evaluator: MetricEvaluator, config: CoordinatorConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &MetricEvaluator {
        &self.evaluator
    }

    /// Evaluate `content` against every metric in `guidelines`.
    pub async fn evaluate_content(
        &self,
        content: &str,
        guidelines: &GuidelinesModel,
    ) -> Result<EvaluationResult> {
        self.evaluate_with_cancel(content, guidelines, &CancellationToken::new())
            .await
    }

    /// Evaluate with a caller deadline. Running out of time is a cancellation.
    pub async fn evaluate_with_deadline(
        &self,
        content: &str,
        guidelines: &GuidelinesModel,
        deadline: Duration,
    ) -> Result<EvaluationResult> {
        let cancel = CancellationToken::new();
        let evaluation = self.evaluate_with_cancel(content, guidelines, &cancel);
        tokio::pin!(evaluation);
        tokio::select! {
            result = &mut evaluation => result,
            _ = tokio::time::sleep(deadline) => {
                cancel.cancel();
                evaluation.await
            }
        }
    }

    /// Evaluate until done or until `cancel` fires.
    pub async fn evaluate_with_cancel(
        &self,
        content: &str,
        guidelines: &GuidelinesModel,
        cancel: &CancellationToken,
    ) -> Result<EvaluationResult> {
        self.evaluate_with_progress(content, guidelines, cancel, None)
            .await
    }

    /// Like [`evaluate_with_cancel`](Self::evaluate_with_cancel), reporting
    /// each finished metric to `progress`.
    #[instrument(skip_all, fields(metrics = guidelines.metric_count()))]
    pub async fn evaluate_with_progress(
        &self,
        content: &str,
        guidelines: &GuidelinesModel,
        cancel: &CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<EvaluationResult> {
        self.validate_content(content)?;

        let started = Instant::now();
        let content_hash = fingerprint(content);
        let span = EvaluationSpan::new(&content_hash);

        self.run(content, content_hash, guidelines, cancel, progress, started)
            .instrument(span.span().clone())
            .await
    }

    /// Reject content before any judge call is made.
    pub fn validate_content(&self, content: &str) -> Result<()> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ScorecardError::InvalidContent("content is empty".to_string()));
        }
        let length = trimmed.chars().count();
        if length < self.config.min_content_length {
            return Err(ScorecardError::InvalidContent(format!(
                "content is {length} characters, minimum is {}",
                self.config.min_content_length
            )));
        }
        let length = content.chars().count();
        if length > self.config.max_content_length {
            return Err(ScorecardError::InvalidContent(format!(
                "content is {length} characters, maximum is {}",
                self.config.max_content_length
            )));
        }
        Ok(())
    }

    async fn run(
        &self,
        content: &str,
        content_hash: String,
        guidelines: &GuidelinesModel,
        cancel: &CancellationToken,
        progress: Option<ProgressSink>,
        started: Instant,
    ) -> Result<EvaluationResult> {
        let metrics = guidelines.all_metrics();
        let requested = metrics.len();
        obs::emit_evaluation_started(&content_hash, requested, content.chars().count());

        if cancel.is_cancelled() {
            return Err(self.cancelled(&content_hash, 0, requested));
        }

        let shared_content: Arc<str> = Arc::from(content);
        let gate = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::with_capacity(requested);

        for (index, metric) in metrics.iter().cloned().enumerate() {
            let evaluator = self.evaluator.clone();
            let content = Arc::clone(&shared_content);
            let gate = Arc::clone(&gate);
            let handle = tasks.spawn(
                async move {
                    let _permit = gate.acquire_owned().await.ok();
                    (index, evaluator.evaluate(&content, &metric).await)
                }
                .in_current_span(),
            );
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<MetricResult>> = vec![None; requested];
        let mut completed = 0;

        while completed < requested {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    return Err(self.cancelled(&content_hash, completed, requested));
                }
                joined = tasks.join_next_with_id() => {
                    let finished = match joined {
                        Some(Ok((_, (index, result)))) => {
                            let scored = result.is_ok();
                            slots[index] = Some(result);
                            Some((index, scored))
                        }
                        Some(Err(e)) => {
                            let index = task_index.get(&e.id()).copied();
                            if let Some(index) = index {
                                warn!(metric = %metrics[index].name, error = %e, "metric task aborted");
                                slots[index] = Some(MetricResult::failed(
                                    metrics[index].clone(),
                                    format!("evaluation task aborted: {e}"),
                                ));
                            }
                            index.map(|index| (index, false))
                        }
                        None => break,
                    };
                    completed += 1;
                    if let (Some(sink), Some((index, scored))) = (&progress, finished) {
                        sink(EvaluationProgress {
                            completed,
                            requested,
                            metric: metrics[index].name.clone(),
                            scored,
                        });
                    }
                }
            }
        }

        // Slot order is canonical guidelines order regardless of completion order.
        let metric_results: Vec<MetricResult> = slots
            .into_iter()
            .zip(metrics)
            .map(|(slot, metric)| {
                slot.unwrap_or_else(|| {
                    MetricResult::failed(metric, "evaluation task did not report a result")
                })
            })
            .collect();

        let aggregate = match aggregate(guidelines, &metric_results) {
            Ok(aggregate) => aggregate,
            Err(e) => {
                obs::emit_evaluation_failed(&content_hash, &e);
                return Err(e);
            }
        };

        let duration = started.elapsed();
        let result = EvaluationResult {
            content_hash,
            timestamp: Utc::now(),
            overall_score: aggregate.overall_score,
            category_scores: aggregate.category_scores,
            metric_results,
            metadata: EvaluationMetadata {
                metrics_evaluated: aggregate.metrics_evaluated,
                metrics_requested: requested,
                evaluation_duration: duration.as_secs_f64(),
            },
        };

        METRICS.inc_evaluations_completed();
        obs::emit_evaluation_finished(
            &result.content_hash,
            result.overall_score,
            result.metadata.metrics_evaluated,
            requested,
            duration.as_millis() as u64,
        );
        Ok(result)
    }

    fn cancelled(&self, content_hash: &str, completed: usize, requested: usize) -> ScorecardError {
        METRICS.inc_evaluations_cancelled();
        obs::emit_evaluation_cancelled(content_hash, completed, requested - completed);
        ScorecardError::Cancelled
    }
}
