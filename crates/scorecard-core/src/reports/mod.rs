//! Report rendering and the report-store boundary.
//!
//! The JSON rendering is the canonical serialized form of an
//! [`EvaluationResult`]; Markdown is a lossy, human-oriented projection of it.

mod fs;
mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::EvaluationResult;
use crate::identity::ReportId;

pub use fs::FsReportStore;
pub use memory::MemoryReportStore;

/// Errors produced by report stores.
#[derive(Debug, thiserror::Error)]
pub enum ReportStoreError {
    #[error("hash prefix '{prefix}' matches {count} different reports")]
    Ambiguous { prefix: String, count: usize },

    #[error("hash prefix '{0}' is too short to identify a report")]
    PrefixTooShort(String),

    #[error("'{0}' is not a hex content hash")]
    InvalidPrefix(String),

    #[error("corrupt report {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReportStoreResult<T> = std::result::Result<T, ReportStoreError>;

/// Shortest hash prefix accepted by [`ReportStore::load`].
pub const MIN_LOOKUP_PREFIX: usize = 4;

/// Where a saved report ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedReport {
    pub id: ReportId,
    /// One entry per written rendering (file paths, cache keys, ...).
    pub locations: Vec<String>,
}

/// Listing entry for a stored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: ReportId,
    pub overall_score: f64,
    pub metrics_evaluated: usize,
    pub metrics_requested: usize,
}

impl ReportSummary {
    pub fn of(result: &EvaluationResult) -> Self {
        Self {
            id: result.report_id(),
            overall_score: result.overall_score,
            metrics_evaluated: result.metadata.metrics_evaluated,
            metrics_requested: result.metadata.metrics_requested,
        }
    }
}

/// Persistence collaborator for evaluation results.
///
/// The content hash is the only idempotency key. Stores decide whether a
/// second save of the same content overwrites or accumulates.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a result.
    async fn save(&self, result: &EvaluationResult) -> ReportStoreResult<SavedReport>;

    /// Most recent report whose content hash starts with `hash`.
    async fn load(&self, hash: &str) -> ReportStoreResult<Option<EvaluationResult>>;

    /// All stored reports, newest first.
    async fn list(&self) -> ReportStoreResult<Vec<ReportSummary>>;
}

/// Validate a lookup key and lower-case it.
pub(crate) fn normalize_lookup(hash: &str) -> ReportStoreResult<String> {
    let hash = hash.trim().to_ascii_lowercase();
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ReportStoreError::InvalidPrefix(hash));
    }
    if hash.len() < MIN_LOOKUP_PREFIX {
        return Err(ReportStoreError::PrefixTooShort(hash));
    }
    Ok(hash)
}

/// Pick the newest of the matches, refusing prefixes that hit several contents.
pub(crate) fn newest_match(
    prefix: &str,
    mut matches: Vec<EvaluationResult>,
) -> ReportStoreResult<Option<EvaluationResult>> {
    let mut hashes: Vec<&str> = matches.iter().map(|r| r.content_hash.as_str()).collect();
    hashes.sort_unstable();
    hashes.dedup();
    if hashes.len() > 1 {
        return Err(ReportStoreError::Ambiguous {
            prefix: prefix.to_string(),
            count: hashes.len(),
        });
    }
    matches.sort_by_key(|r| r.timestamp);
    Ok(matches.pop())
}

/// Serialize to the canonical JSON shape.
pub fn render_json(result: &EvaluationResult, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    }
}

/// Parse a report previously written by [`render_json`].
pub fn parse_json(text: &str) -> serde_json::Result<EvaluationResult> {
    serde_json::from_str(text)
}

/// Render a human-readable Markdown report.
pub fn render_markdown(result: &EvaluationResult) -> String {
    let mut out = String::new();
    out.push_str("# Content Evaluation Report\n\n");
    out.push_str(&format!(
        "Generated: {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Content Hash: `{}`\n\n", result.content_hash));
    out.push_str(&format!(
        "## Overall Score: {:.2}/5.00\n\n",
        result.overall_score
    ));

    out.push_str("## Category Scores\n\n");
    for category in result.category_order() {
        match result.category_score(category) {
            Some(score) => out.push_str(&format!("- **{}**: {score:.2}/5.00\n", title(category))),
            None => out.push_str(&format!("- **{}**: not scored\n", title(category))),
        }
    }

    out.push_str("\n## Metric Results\n");
    for category in result.category_order() {
        out.push_str(&format!("\n### {}\n", title(category)));
        for metric_result in result
            .metric_results
            .iter()
            .filter(|r| r.metric.category == category)
        {
            let metric = &metric_result.metric;
            out.push_str(&format!("\n#### {}\n", title(&metric.name)));
            out.push_str(&format!("*{}*\n\n", metric.description));

            if let Some(reason) = metric_result.status.failure_reason() {
                out.push_str(&format!("**Status**: failed ({reason})\n"));
                continue;
            }
            if let Some(score) = metric_result.score {
                out.push_str(&format!("**Score**: {score}/5\n\n"));
            }
            out.push_str(&format!("**Reasoning**: {}\n\n", metric_result.reasoning));
            if !metric_result.improvement_advice.is_empty() {
                out.push_str(&format!(
                    "**Improvement Advice**: {}\n\n",
                    metric_result.improvement_advice
                ));
            }
            push_examples(&mut out, "Positive Examples", &metric_result.positive_examples);
            push_examples(
                &mut out,
                "Improvement Examples",
                &metric_result.improvement_examples,
            );
        }
    }

    let metadata = &result.metadata;
    out.push_str("\n## Metadata\n\n");
    out.push_str(&format!(
        "- **Metrics evaluated**: {}/{}\n",
        metadata.metrics_evaluated, metadata.metrics_requested
    ));
    out.push_str(&format!(
        "- **Evaluation time**: {:.2}s\n",
        metadata.evaluation_duration
    ));
    if result.is_partial() {
        out.push_str("- **Partial result**: some metrics could not be evaluated\n");
    }
    out
}

fn push_examples(out: &mut String, heading: &str, examples: &[String]) {
    if examples.is_empty() {
        return;
    }
    out.push_str(&format!("**{heading}**:\n"));
    for example in examples {
        out.push_str(&format!("- \"{example}\"\n"));
    }
    out.push('\n');
}

/// `tone_appropriateness` → `Tone appropriateness`.
fn title(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use indexmap::IndexMap;

    use crate::domain::{EvaluationMetadata, EvaluationResult, Metric, MetricResult, MetricStatus};
    use crate::identity::fingerprint;

    pub fn sample_result(content: &str, second: u32) -> EvaluationResult {
        let metric = |name: &str, category: &str| Metric {
            name: name.to_string(),
            description: format!("{name} description"),
            category: category.to_string(),
            weight: 1.0,
        };
        let mut category_scores = IndexMap::new();
        category_scores.insert("clarity".to_string(), 4.0);
        EvaluationResult {
            content_hash: fingerprint(content),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 18, 15, 56, second).unwrap(),
            overall_score: 4.0,
            category_scores,
            metric_results: vec![
                MetricResult {
                    metric: metric("conciseness", "clarity"),
                    score: Some(4),
                    reasoning: "Tight prose.".to_string(),
                    improvement_advice: "Trim the intro.".to_string(),
                    positive_examples: vec!["Short sentences".to_string()],
                    improvement_examples: vec![],
                    confidence: 0.8,
                    status: MetricStatus::Ok,
                },
                MetricResult::failed(metric("data_support", "accuracy"), "judge timed out"),
            ],
            metadata: EvaluationMetadata {
                metrics_evaluated: 1,
                metrics_requested: 2,
                evaluation_duration: 1.25,
            },
        }
    }
}
