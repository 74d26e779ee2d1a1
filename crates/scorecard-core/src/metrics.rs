//! Process-wide atomic counters.
//!
//! Incremented silently at the call site; [`Metrics::flush`] emits the
//! current values as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    judge_calls: AtomicU64,
    judge_retries: AtomicU64,
    metric_failures: AtomicU64,
    evaluations_completed: AtomicU64,
    evaluations_cancelled: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            judge_calls: AtomicU64::new(0),
            judge_retries: AtomicU64::new(0),
            metric_failures: AtomicU64::new(0),
            evaluations_completed: AtomicU64::new(0),
            evaluations_cancelled: AtomicU64::new(0),
        }
    }

    pub fn inc_judge_calls(&self) {
        self.judge_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_judge_retries(&self) {
        self.judge_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_metric_failures(&self) {
        self.metric_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evaluations_completed(&self) {
        self.evaluations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evaluations_cancelled(&self) {
        self.evaluations_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all counters as a single event, e.g. before the process exits.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            judge_calls = self.judge_calls(),
            judge_retries = self.judge_retries(),
            metric_failures = self.metric_failures(),
            evaluations_completed = self.evaluations_completed(),
            evaluations_cancelled = self.evaluations_cancelled(),
        );
    }

    pub fn judge_calls(&self) -> u64 {
        self.judge_calls.load(Ordering::Relaxed)
    }

    pub fn judge_retries(&self) -> u64 {
        self.judge_retries.load(Ordering::Relaxed)
    }

    pub fn metric_failures(&self) -> u64 {
        self.metric_failures.load(Ordering::Relaxed)
    }

    pub fn evaluations_completed(&self) -> u64 {
        self.evaluations_completed.load(Ordering::Relaxed)
    }

    pub fn evaluations_cancelled(&self) -> u64 {
        self.evaluations_cancelled.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.judge_calls.store(0, Ordering::Relaxed);
        self.judge_retries.store(0, Ordering::Relaxed);
        self.metric_failures.store(0, Ordering::Relaxed);
        self.evaluations_completed.store(0, Ordering::Relaxed);
        self.evaluations_cancelled.store(0, Ordering::Relaxed);
    }
}
