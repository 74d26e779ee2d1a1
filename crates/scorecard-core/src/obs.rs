//! Structured lifecycle events for evaluations.
//!
//! Every event carries an `event` field (`evaluation.started`,
//! `metric.failed`, ...) so log pipelines can filter on it without parsing
//! messages. Wrap a submission in [`EvaluationSpan`] to tag all of its lines.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::identity::short_hash;

/// RAII guard holding an evaluation-scoped span.
///
/// ```ignore
/// let span = EvaluationSpan::new(&content_hash);
/// let _entered = span.enter();
/// ```
pub struct EvaluationSpan {
    evaluation_id: Uuid,
    span: tracing::Span,
}

impl EvaluationSpan {
    pub fn new(content_hash: &str) -> Self {
        let evaluation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "scorecard.evaluation",
            evaluation_id = %evaluation_id,
            content = %short_hash(content_hash),
        );
        Self {
            evaluation_id,
            span,
        }
    }

    pub fn evaluation_id(&self) -> Uuid {
        self.evaluation_id
    }

    /// Span to attach to spawned tasks with `Instrument::instrument`.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

pub fn emit_evaluation_started(content_hash: &str, metrics_requested: usize, content_chars: usize) {
    info!(
        event = "evaluation.started",
        content = %short_hash(content_hash),
        metrics_requested = metrics_requested,
        content_chars = content_chars,
    );
}

pub fn emit_evaluation_finished(
    content_hash: &str,
    overall_score: f64,
    metrics_evaluated: usize,
    metrics_requested: usize,
    duration_ms: u64,
) {
    info!(
        event = "evaluation.finished",
        content = %short_hash(content_hash),
        overall_score = overall_score,
        metrics_evaluated = metrics_evaluated,
        metrics_requested = metrics_requested,
        partial = metrics_evaluated < metrics_requested,
        duration_ms = duration_ms,
    );
}

/// Every metric failed; no result is produced.
pub fn emit_evaluation_failed(content_hash: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "evaluation.failed",
        content = %short_hash(content_hash),
        error = %error,
    );
}

pub fn emit_evaluation_cancelled(content_hash: &str, completed: usize, outstanding: usize) {
    warn!(
        event = "evaluation.cancelled",
        content = %short_hash(content_hash),
        completed = completed,
        outstanding = outstanding,
    );
}

pub fn emit_metric_evaluated(metric: &str, score: u8, attempts: u32, duration_ms: u64) {
    info!(
        event = "metric.evaluated",
        metric = %metric,
        score = score,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

pub fn emit_metric_failed(metric: &str, reason: &str) {
    warn!(event = "metric.failed", metric = %metric, reason = %reason);
}

pub fn emit_judge_retry(metric: &str, attempt: u32, delay: Duration, error: &crate::JudgeError) {
    warn!(
        event = "judge.retry",
        metric = %metric,
        attempt = attempt,
        delay_ms = delay.as_millis() as u64,
        kind = error.kind(),
        error = %error,
    );
}
