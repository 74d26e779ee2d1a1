//! Line-delimited JSON-RPC tool server (`scorecard serve`).
//!
//! Tools: `evaluate_content`, `evaluate_metric`, `get_guidelines` and
//! `request_status`. Each request line is handled on its own task so a
//! status query can be answered while an evaluation is still running.
//! Replies are written one JSON object per line, in completion order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scorecard_core::{
    fingerprint, CancellationToken, Coordinator, EvaluationProgress, EvaluationResult,
    GuidelinesModel, ProgressSink, ReportStore, ScorecardError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::rpc::{
    error_codes, CallToolParams, JsonRpcRequest, JsonRpcResponse, RpcError, ToolResultBody,
    JSONRPC_VERSION,
};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Finished requests kept for `request_status` before the oldest are dropped.
const MAX_FINISHED_REQUESTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

/// Point-in-time view of a tracked request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSnapshot {
    pub request_id: String,
    pub status: RequestStatus,
    pub total_metrics: usize,
    pub completed_metrics: usize,
    /// Percentage of metrics finished.
    pub progress: f64,
    /// Seconds since the request started, frozen once it finishes.
    pub elapsed_time: f64,
}

#[derive(Debug)]
struct TrackedRequest {
    status: RequestStatus,
    total: usize,
    completed: usize,
    started: Instant,
    finished: Option<Instant>,
}

/// Progress of tool requests, keyed by request id.
#[derive(Debug, Default)]
pub struct RequestTracker {
    requests: Mutex<HashMap<String, TrackedRequest>>,
}

impl RequestTracker {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrackedRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start(&self, request_id: &str, total: usize) {
        let mut requests = self.lock();
        requests.insert(
            request_id.to_string(),
            TrackedRequest {
                status: RequestStatus::InProgress,
                total,
                completed: 0,
                started: Instant::now(),
                finished: None,
            },
        );
        evict_finished(&mut requests);
    }

    pub fn advance(&self, request_id: &str, completed: usize) {
        if let Some(request) = self.lock().get_mut(request_id) {
            request.completed = completed.min(request.total);
        }
    }

    pub fn finish(&self, request_id: &str, status: RequestStatus) {
        if let Some(request) = self.lock().get_mut(request_id) {
            request.status = status;
            request.finished = Some(Instant::now());
            if status == RequestStatus::Completed {
                request.completed = request.total;
            }
        }
    }

    pub fn snapshot(&self, request_id: &str) -> Option<RequestSnapshot> {
        self.lock().get(request_id).map(|request| {
            let end = request.finished.unwrap_or_else(Instant::now);
            let progress = if request.total == 0 {
                0.0
            } else {
                request.completed as f64 * 100.0 / request.total as f64
            };
            RequestSnapshot {
                request_id: request_id.to_string(),
                status: request.status,
                total_metrics: request.total,
                completed_metrics: request.completed,
                progress,
                elapsed_time: end.duration_since(request.started).as_secs_f64(),
            }
        })
    }
}

fn evict_finished(requests: &mut HashMap<String, TrackedRequest>) {
    let mut finished: Vec<(Instant, String)> = requests
        .iter()
        .filter_map(|(id, r)| r.finished.map(|at| (at, id.clone())))
        .collect();
    if finished.len() <= MAX_FINISHED_REQUESTS {
        return;
    }
    finished.sort();
    let excess = finished.len() - MAX_FINISHED_REQUESTS;
    for (_, id) in finished.into_iter().take(excess) {
        requests.remove(&id);
    }
}

/// Id for a request: content plus the sorted metric selection.
pub fn request_id(content: &str, metrics: &[String]) -> String {
    let selection = if metrics.is_empty() {
        "all".to_string()
    } else {
        let mut sorted: Vec<&str> = metrics.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.join(",")
    };
    fingerprint(&format!("{content}:{selection}"))
}

#[derive(Debug, Deserialize)]
struct EvaluateContentArgs {
    content: String,
    #[serde(default)]
    metrics: Vec<String>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvaluateMetricArgs {
    content: String,
    metric: String,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestStatusArgs {
    request_id: String,
}

/// Answers tool calls against one coordinator and one guidelines model.
pub struct ToolServer {
    coordinator: Coordinator,
    guidelines: GuidelinesModel,
    store: Option<Arc<dyn ReportStore>>,
    request_timeout: Duration,
    requests: Arc<RequestTracker>,
}

impl ToolServer {
    pub fn new(
        coordinator: Coordinator,
        guidelines: GuidelinesModel,
        request_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            guidelines,
            store: None,
            request_timeout,
            requests: Arc::new(RequestTracker::default()),
        }
    }

    /// Save every successful `evaluate_content` result to `store`.
    pub fn with_store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[cfg(test)]
    fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    /// Handle one input line; `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.dispatch(request).await?,
            Err(e) => JsonRpcResponse::error(
                Value::Null,
                RpcError::new(error_codes::PARSE_ERROR, format!("parse error: {e}")),
            ),
        };
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                RpcError::new(
                    error_codes::INVALID_REQUEST,
                    format!("unsupported jsonrpc version '{}'", request.jsonrpc),
                ),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => match request.tool_params() {
                Ok(params) => self.call_tool(params).await.and_then(|body| {
                    serde_json::to_value(body).map_err(|e| {
                        RpcError::new(error_codes::INTERNAL_ERROR, e.to_string())
                    })
                }),
                Err(e) => Err(RpcError::invalid_params(format!("invalid tool call: {e}"))),
            },
            other => Err(RpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method '{other}' not found"),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn call_tool(&self, params: CallToolParams) -> Result<ToolResultBody, RpcError> {
        info!(tool = %params.name, "tool call");
        match params.name.as_str() {
            "evaluate_content" => {
                let args: EvaluateContentArgs = arguments(params.arguments)?;
                Ok(self.evaluate_content(args).await)
            }
            "evaluate_metric" => {
                let args: EvaluateMetricArgs = arguments(params.arguments)?;
                Ok(self.evaluate_metric(args).await)
            }
            "get_guidelines" => Ok(ToolResultBody::structured(guidelines_summary(
                &self.guidelines,
            ))),
            "request_status" => {
                let args: RequestStatusArgs = arguments(params.arguments)?;
                Ok(match self.requests.snapshot(&args.request_id) {
                    Some(snapshot) => ToolResultBody::structured(json!(snapshot)),
                    None => ToolResultBody::failure(format!(
                        "Unknown request '{}'",
                        args.request_id
                    )),
                })
            }
            other => Err(RpcError::invalid_params(format!("unknown tool '{other}'"))),
        }
    }

    async fn evaluate_content(&self, args: EvaluateContentArgs) -> ToolResultBody {
        let request_id = args
            .request_id
            .unwrap_or_else(|| request_id(&args.content, &args.metrics));
        let result = match self.run(&request_id, &args.content, &args.metrics).await {
            Ok(result) => result,
            Err(message) => return ToolResultBody::failure(message),
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&result).await {
                warn!(error = %e, content_hash = %result.content_hash, "failed to save report");
            }
        }

        ToolResultBody::structured(json!({
            "request_id": request_id,
            "evaluation": result,
        }))
    }

    async fn evaluate_metric(&self, args: EvaluateMetricArgs) -> ToolResultBody {
        let metrics = vec![args.metric];
        let request_id = args
            .request_id
            .unwrap_or_else(|| request_id(&args.content, &metrics));
        let result = match self.run(&request_id, &args.content, &metrics).await {
            Ok(result) => result,
            Err(message) => return ToolResultBody::failure(message),
        };
        match result.metric_results.first() {
            Some(metric) => ToolResultBody::structured(json!({
                "request_id": request_id,
                "metric": metric.metric.name,
                "category": metric.metric.category,
                "score": metric.score,
                "reasoning": metric.reasoning,
                "improvement_advice": metric.improvement_advice,
                "positive_examples": metric.positive_examples,
                "improvement_examples": metric.improvement_examples,
                "confidence": metric.confidence,
            })),
            None => ToolResultBody::failure("Evaluation completed but returned no metric result"),
        }
    }

    /// Evaluate under the request timeout, tracking progress under `request_id`.
    async fn run(
        &self,
        request_id: &str,
        content: &str,
        metrics: &[String],
    ) -> Result<EvaluationResult, String> {
        let guidelines = if metrics.is_empty() {
            self.guidelines.clone()
        } else {
            self.guidelines.restrict_to(metrics).map_err(|e| {
                let available: Vec<String> =
                    self.guidelines.all_metrics().into_iter().map(|m| m.name).collect();
                format!("{e} (available: {})", available.join(", "))
            })?
        };

        self.requests.start(request_id, guidelines.metric_count());
        let sink: ProgressSink = {
            let requests = Arc::clone(&self.requests);
            let request_id = request_id.to_string();
            Arc::new(move |event: EvaluationProgress| {
                requests.advance(&request_id, event.completed);
            })
        };

        let cancel = CancellationToken::new();
        let evaluation =
            self.coordinator
                .evaluate_with_progress(content, &guidelines, &cancel, Some(sink));
        tokio::pin!(evaluation);
        let outcome = tokio::select! {
            outcome = &mut evaluation => outcome,
            _ = tokio::time::sleep(self.request_timeout) => {
                cancel.cancel();
                evaluation.await
            }
        };

        match outcome {
            Ok(result) => {
                self.requests.finish(request_id, RequestStatus::Completed);
                Ok(result)
            }
            Err(ScorecardError::Cancelled) => {
                self.requests.finish(request_id, RequestStatus::TimedOut);
                warn!(%request_id, timeout_secs = self.request_timeout.as_secs(), "request timed out");
                Err(format!(
                    "Request timed out after {} seconds",
                    self.request_timeout.as_secs()
                ))
            }
            Err(e) => {
                self.requests.finish(request_id, RequestStatus::Failed);
                Err(format!("Error evaluating content: {e}"))
            }
        }
    }
}

fn arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, RpcError> {
    serde_json::from_value(arguments)
        .map_err(|e| RpcError::invalid_params(format!("invalid arguments: {e}")))
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "scorecard",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "evaluate_content",
            "description": "Evaluate content against quality metrics and provide detailed feedback",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The content to evaluate"},
                    "metrics": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional list of specific metrics to evaluate"
                    },
                    "request_id": {
                        "type": "string",
                        "description": "Optional id to follow the request with request_status"
                    }
                },
                "required": ["content"]
            }
        },
        {
            "name": "evaluate_metric",
            "description": "Evaluate content against a single specific metric",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The content to evaluate"},
                    "metric": {"type": "string", "description": "The name of the metric to evaluate"},
                    "request_id": {"type": "string"}
                },
                "required": ["content", "metric"]
            }
        },
        {
            "name": "get_guidelines",
            "description": "Get the current evaluation guidelines and available metrics",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "request_status",
            "description": "Progress of a running or finished evaluation request",
            "inputSchema": {
                "type": "object",
                "properties": {"request_id": {"type": "string"}},
                "required": ["request_id"]
            }
        }
    ])
}

/// Categories in guidelines order, each with its metrics.
fn guidelines_summary(guidelines: &GuidelinesModel) -> Value {
    let categories: Vec<Value> = guidelines
        .categories()
        .iter()
        .map(|category| {
            let metrics: Vec<Value> = category
                .metrics
                .iter()
                .map(|m| json!({"name": m.name, "description": m.description, "weight": m.weight}))
                .collect();
            json!({
                "name": category.name,
                "description": category.description,
                "weight": category.weight,
                "metrics": metrics,
            })
        })
        .collect();
    json!({ "categories": categories, "metric_count": guidelines.metric_count() })
}

/// Read requests from `input` until EOF, writing one reply line per request.
pub async fn serve<R, W>(server: Arc<ToolServer>, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let mut lines = input.lines();
    let mut handlers = JoinSet::new();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let server = Arc::clone(&server);
                    let tx = tx.clone();
                    handlers.spawn(async move {
                        if let Some(reply) = server.handle_line(&line).await {
                            // The writer outlives every handler.
                            let _ = tx.send(reply).await;
                        }
                    });
                }
                None => reading = false,
            },
            Some(reply) = rx.recv() => write_line(&mut output, &reply).await?,
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "request handler failed");
                }
            }
        }

        if !reading && handlers.is_empty() {
            while let Ok(reply) = rx.try_recv() {
                write_line(&mut output, &reply).await?;
            }
            break;
        }
    }
    info!("input closed, tool server stopping");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::fakes::{Scripted, ScriptedJudge};
    use scorecard_core::{
        CoordinatorConfig, EvaluatorConfig, JudgeLimiter, MemoryReportStore, RetryPolicy,
    };

    const CONTENT: &str = "Rust makes fearless concurrency practical.";

    fn guidelines() -> GuidelinesModel {
        GuidelinesModel::from_yaml_str(
            r#"
clarity:
  weight: 1.0
  description: How clear is it?
  metrics:
    conciseness: {description: No filler, weight: 1.0}
    structure: {description: Logical flow, weight: 1.0}
accuracy:
  weight: 1.2
  description: Is it correct?
  metrics:
    data_support: {description: Claims backed by data, weight: 1.0}
"#,
        )
        .unwrap()
    }

    fn server(judge: &Arc<ScriptedJudge>, timeout: Duration) -> ToolServer {
        let config = CoordinatorConfig {
            evaluator: EvaluatorConfig {
                retry: RetryPolicy::none(),
                ..EvaluatorConfig::default()
            },
            ..CoordinatorConfig::default()
        };
        let coordinator = Coordinator::new(judge.clone(), JudgeLimiter::new(4), config);
        ToolServer::new(coordinator, guidelines(), timeout)
    }

    async fn call(server: &ToolServer, request: Value) -> Value {
        let reply = server.handle_line(&request.to_string()).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
    }

    #[tokio::test]
    async fn lists_the_four_tools() {
        let server = server(&Arc::new(ScriptedJudge::new()), Duration::from_secs(30));
        let reply = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        let names: Vec<&str> = reply["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["evaluate_content", "evaluate_metric", "get_guidelines", "request_status"]
        );
    }

    #[tokio::test]
    async fn evaluate_content_returns_and_saves_the_evaluation() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::score(4)));
        let store = Arc::new(MemoryReportStore::new());
        let server = server(&judge, Duration::from_secs(30)).with_store(store.clone());

        let reply = call(&server, tool_call(7, "evaluate_content", json!({"content": CONTENT}))).await;

        assert_eq!(reply["id"], 7);
        let result = &reply["result"];
        assert_eq!(result["isError"], false);
        let structured = &result["structuredContent"];
        assert_eq!(structured["request_id"], request_id(CONTENT, &[]));
        assert_eq!(structured["evaluation"]["overall_score"], 4.0);
        assert_eq!(structured["evaluation"]["metadata"]["metrics_evaluated"], 3);
        assert_eq!(judge.calls(), 3);
        assert_eq!(store.list().await.unwrap().len(), 1);

        let status = server.requests().snapshot(&request_id(CONTENT, &[])).unwrap();
        assert_eq!(status.status, RequestStatus::Completed);
        assert_eq!(status.completed_metrics, 3);
        assert_eq!(status.progress, 100.0);
    }

    #[tokio::test]
    async fn evaluate_metric_returns_one_metric() {
        let judge = Arc::new(ScriptedJudge::new().with_score("data_support", 2));
        let server = server(&judge, Duration::from_secs(30));

        let reply = call(
            &server,
            tool_call(2, "evaluate_metric", json!({"content": CONTENT, "metric": "data_support"})),
        )
        .await;

        let structured = &reply["result"]["structuredContent"];
        assert_eq!(structured["metric"], "data_support");
        assert_eq!(structured["category"], "accuracy");
        assert_eq!(structured["score"], 2);
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_metric_is_a_tool_error_listing_alternatives() {
        let judge = Arc::new(ScriptedJudge::new());
        let server = server(&judge, Duration::from_secs(30));

        let reply = call(
            &server,
            tool_call(3, "evaluate_metric", json!({"content": CONTENT, "metric": "tone"})),
        )
        .await;

        assert_eq!(reply["result"]["isError"], true);
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("tone"));
        assert!(text.contains("available: conciseness, structure, data_support"));
        assert_eq!(judge.calls(), 0);
    }

    #[tokio::test]
    async fn get_guidelines_keeps_category_order() {
        let server = server(&Arc::new(ScriptedJudge::new()), Duration::from_secs(30));
        let reply = call(&server, tool_call(4, "get_guidelines", json!({}))).await;

        let structured = &reply["result"]["structuredContent"];
        assert_eq!(structured["categories"][0]["name"], "clarity");
        assert_eq!(structured["categories"][1]["name"], "accuracy");
        assert_eq!(structured["categories"][0]["metrics"][1]["name"], "structure");
        assert_eq!(structured["metric_count"], 3);
    }

    #[tokio::test]
    async fn protocol_errors_use_jsonrpc_codes() {
        let server = server(&Arc::new(ScriptedJudge::new()), Duration::from_secs(30));

        let reply: Value =
            serde_json::from_str(&server.handle_line("{not json").await.unwrap()).unwrap();
        assert_eq!(reply["error"]["code"], error_codes::PARSE_ERROR);
        assert_eq!(reply["id"], Value::Null);

        let reply = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"})).await;
        assert_eq!(reply["error"]["code"], error_codes::METHOD_NOT_FOUND);

        let reply = call(&server, json!({"jsonrpc": "1.0", "id": 2, "method": "ping"})).await;
        assert_eq!(reply["error"]["code"], error_codes::INVALID_REQUEST);

        let reply = call(&server, tool_call(3, "evaluate_content", json!({}))).await;
        assert_eq!(reply["error"]["code"], error_codes::INVALID_PARAMS);

        let reply = call(&server, tool_call(4, "translate", json!({}))).await;
        assert_eq!(reply["error"]["code"], error_codes::INVALID_PARAMS);

        let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(server.handle_line(&notification.to_string()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn request_status_follows_a_running_evaluation() {
        let judge = Arc::new(
            ScriptedJudge::new()
                .with_metric_latency("conciseness", Duration::from_secs(1))
                .with_metric_latency("structure", Duration::from_secs(5))
                .with_metric_latency("data_support", Duration::from_secs(9)),
        );
        let server = Arc::new(server(&judge, Duration::from_secs(60)));

        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                call(
                    &server,
                    tool_call(1, "evaluate_content", json!({"content": CONTENT, "request_id": "r-1"})),
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        let status = call(&server, tool_call(2, "request_status", json!({"request_id": "r-1"}))).await;
        let snapshot = &status["result"]["structuredContent"];
        assert_eq!(snapshot["status"], "in_progress");
        assert_eq!(snapshot["total_metrics"], 3);
        assert_eq!(snapshot["completed_metrics"], 1);

        let reply = running.await.unwrap();
        assert_eq!(reply["result"]["structuredContent"]["request_id"], "r-1");
        let done = server.requests().snapshot("r-1").unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert_eq!(done.completed_metrics, 3);

        let unknown = call(&server, tool_call(3, "request_status", json!({"request_id": "nope"}))).await;
        assert_eq!(unknown["result"]["isError"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::Hang));
        let server = server(&judge, Duration::from_secs(5));

        let reply = call(
            &server,
            tool_call(1, "evaluate_content", json!({"content": CONTENT, "request_id": "slow"})),
        )
        .await;

        assert_eq!(reply["result"]["isError"], true);
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(text, "Request timed out after 5 seconds");
        assert_eq!(
            server.requests().snapshot("slow").unwrap().status,
            RequestStatus::TimedOut
        );
    }

    #[test]
    fn request_id_ignores_metric_order() {
        let a = request_id(CONTENT, &["structure".into(), "conciseness".into()]);
        let b = request_id(CONTENT, &["conciseness".into(), "structure".into()]);
        assert_eq!(a, b);
        assert_ne!(a, request_id(CONTENT, &[]));
    }

    #[test]
    fn tracker_drops_the_oldest_finished_requests() {
        let tracker = RequestTracker::default();
        for i in 0..=MAX_FINISHED_REQUESTS {
            let id = format!("r{i}");
            tracker.start(&id, 1);
            tracker.finish(&id, RequestStatus::Completed);
        }
        tracker.start("live", 2);

        assert!(tracker.snapshot("r0").is_none());
        assert!(tracker.snapshot("r1").is_some());
        assert_eq!(tracker.snapshot("live").unwrap().status, RequestStatus::InProgress);
    }

    #[tokio::test]
    async fn serve_answers_every_request_line() {
        let judge = Arc::new(ScriptedJudge::new());
        let server = Arc::new(server(&judge, Duration::from_secs(30)));
        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}).to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            String::new(),
            tool_call(2, "evaluate_content", json!({"content": CONTENT})).to_string(),
            "garbage".to_string(),
        ]
        .join("\n");
        let mut output = Vec::new();

        serve(server, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        let by_id = |id: Value| replies.iter().find(|r| r["id"] == id).unwrap();
        assert_eq!(by_id(json!(1))["result"]["serverInfo"]["name"], "scorecard");
        assert_eq!(by_id(json!(2))["result"]["isError"], false);
        assert_eq!(by_id(Value::Null)["error"]["code"], error_codes::PARSE_ERROR);
    }
}
