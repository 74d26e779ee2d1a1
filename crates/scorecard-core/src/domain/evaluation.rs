//! The assembled outcome of one content submission.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::metric::MetricResult;
use crate::identity::ReportId;

/// Bookkeeping attached to every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    /// Metrics that finished with an `Ok` status.
    pub metrics_evaluated: usize,
    /// Metrics present in the guidelines used for this submission.
    pub metrics_requested: usize,
    /// Wall-clock seconds from submission to aggregation.
    #[serde(rename = "evaluation_time")]
    pub evaluation_duration: f64,
}

/// Weighted, multi-metric evaluation of one piece of content.
///
/// Built in a single orchestration pass and never mutated afterwards.
/// Identified by `content_hash`; see [`crate::identity::fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    /// Categories with at least one successful metric, in guidelines order.
    /// Others are absent.
    pub category_scores: IndexMap<String, f64>,
    /// In canonical guidelines order.
    pub metric_results: Vec<MetricResult>,
    pub metadata: EvaluationMetadata,
}

impl EvaluationResult {
    pub fn report_id(&self) -> ReportId {
        ReportId::new(self.content_hash.clone(), self.timestamp)
    }

    /// True when some requested metrics did not produce a score.
    pub fn is_partial(&self) -> bool {
        self.metadata.metrics_evaluated < self.metadata.metrics_requested
    }

    pub fn category_score(&self, category: &str) -> Option<f64> {
        self.category_scores.get(category).copied()
    }

    pub fn failed_metrics(&self) -> impl Iterator<Item = &MetricResult> {
        self.metric_results.iter().filter(|r| !r.is_ok())
    }

    /// Distinct category names in the order they first appear in `metric_results`.
    pub fn category_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for result in &self.metric_results {
            let category = result.metric.category.as_str();
            if !order.contains(&category) {
                order.push(category);
            }
        }
        order
    }
}
