//! Scripted judge for tests and offline demos.
//!
//! Responses are scripted per metric name. The last scripted entry for a
//! metric repeats forever; metrics without a script get the fallback.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::judge::{JudgeClient, JudgeError, JudgeRequest, JudgeResult, RawJudgment};

/// One scripted judge behaviour.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(JudgeError),
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
}

impl Scripted {
    /// A complete, valid judgment with the given score.
    pub fn score(score: u8) -> Self {
        Self::Reply(judgment_json(score))
    }
}

/// Valid judge JSON for `score`.
pub fn judgment_json(score: u8) -> String {
    serde_json::json!({
        "score": score,
        "reasoning": format!("Scripted judgment with score {score}."),
        "improvement_advice": "Tighten the opening paragraph.",
        "positive_examples": ["A clear first sentence"],
        "improvement_examples": ["A long, winding second sentence"],
    })
    .to_string()
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Marks a call cancelled if it is dropped before finishing.
struct CallGuard<'a> {
    counters: &'a Counters,
    finished: bool,
}

impl<'a> CallGuard<'a> {
    fn start(counters: &'a Counters) -> Self {
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            counters,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Judge that answers from a script instead of a provider.
#[derive(Debug)]
pub struct ScriptedJudge {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Scripted,
    latency: Duration,
    metric_latency: HashMap<String, Duration>,
    per_metric_calls: Mutex<HashMap<String, usize>>,
    counters: Counters,
}

impl Default for ScriptedJudge {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedJudge {
    /// Every metric scores 3 unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Scripted::score(3),
            latency: Duration::ZERO,
            metric_latency: HashMap::new(),
            per_metric_calls: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Append a behaviour to `metric`'s script.
    pub fn script(self, metric: &str, behaviour: Scripted) -> Self {
        lock(&self.scripts)
            .entry(metric.to_string())
            .or_default()
            .push_back(behaviour);
        self
    }

    pub fn with_score(self, metric: &str, score: u8) -> Self {
        self.script(metric, Scripted::score(score))
    }

    pub fn with_fallback(mut self, behaviour: Scripted) -> Self {
        self.fallback = behaviour;
        self
    }

    /// Simulated provider latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Latency for one metric, overriding [`with_latency`](Self::with_latency).
    pub fn with_metric_latency(mut self, metric: &str, latency: Duration) -> Self {
        self.metric_latency.insert(metric.to_string(), latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, metric: &str) -> usize {
        lock(&self.per_metric_calls).get(metric).copied().unwrap_or(0)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Calls that returned (successfully or with an error).
    pub fn completed(&self) -> usize {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// Calls dropped before they returned.
    pub fn cancelled(&self) -> usize {
        self.counters.cancelled.load(Ordering::SeqCst)
    }

    fn next(&self, metric: &str) -> Scripted {
        *lock(&self.per_metric_calls)
            .entry(metric.to_string())
            .or_default() += 1;
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(metric) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Scripted::Hang),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl JudgeClient for ScriptedJudge {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-judge"
    }

    async fn invoke(&self, request: &JudgeRequest, _timeout: Duration) -> JudgeResult<RawJudgment> {
        let metric = request.context.metric_name.as_str();
        let behaviour = self.next(metric);
        let guard = CallGuard::start(&self.counters);

        let latency = self.metric_latency.get(metric).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let outcome = match behaviour {
            Scripted::Reply(text) => Ok(RawJudgment::new(text, self.model())),
            Scripted::Fail(error) => Err(error),
            Scripted::Hang => std::future::pending().await,
        };
        guard.finish();
        outcome
    }
}
