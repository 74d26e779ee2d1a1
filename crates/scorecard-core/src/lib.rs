//! Scorecard Core
//!
//! Evaluation orchestration for weighted, judge-scored content scorecards:
//! guidelines, the judge capability, single-metric evaluation, fan-out/fan-in
//! coordination, weighted aggregation and stable report identity. Report
//! rendering/storage, samples and configuration are the collaborators that
//! front ends wire around it.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod evaluator;
pub mod fakes;
pub mod guidelines;
pub mod identity;
pub mod judge;
pub mod metrics;
pub mod obs;
pub mod reports;
pub mod samples;
pub mod telemetry;

pub use aggregate::{aggregate, category_score, weighted_mean, Aggregate};
pub use config::{
    AppConfig, ConfigError, ConfigResult, EvaluationSettings, LlmConfig, ProviderKind,
    ScorecardConfig,
};
pub use coordinator::{
    CancellationToken, Coordinator, CoordinatorConfig, EvaluationProgress, ProgressSink,
};
pub use domain::{
    EvaluationMetadata, EvaluationResult, Metric, MetricResult, MetricStatus, Result,
    ScorecardError, MAX_SCORE, MIN_SCORE,
};
pub use evaluator::{
    decode_judgment, DecodeError, EvaluatorConfig, Judgment, MetricEvaluator, PromptTemplate,
    RetryPolicy,
};
pub use guidelines::{
    default_guidelines, load_guidelines_or_default, Category, GuidelinesModel, GuidelinesOrigin,
    GuidelinesSource,
};
pub use identity::{fingerprint, ReportId};
pub use judge::{
    ConnectionCheck, JudgeClient, JudgeError, JudgeLimiter, JudgeRequest, JudgeResult,
    PromptContext, RawJudgment, TokenUsage,
};
pub use metrics::METRICS;
pub use reports::{
    parse_json, render_json, render_markdown, FsReportStore, MemoryReportStore, ReportStore,
    ReportStoreError, ReportStoreResult, ReportSummary, SavedReport,
};
pub use samples::{Sample, SampleLibrary};
pub use telemetry::init_tracing;
