//! Metric definitions and per-metric judgments.

use serde::{Deserialize, Serialize};

/// Lowest score a judge may award.
pub const MIN_SCORE: u8 = 1;
/// Highest score a judge may award.
pub const MAX_SCORE: u8 = 5;

/// One named, weighted question the judge answers about the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Unique across the whole guidelines model.
    pub name: String,
    pub description: String,
    /// Name of the owning category.
    pub category: String,
    /// Weight within the category, strictly positive.
    pub weight: f64,
}

/// Outcome of a single metric evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum MetricStatus {
    #[default]
    Ok,
    Failed(String),
}

impl MetricStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Failed(reason) => Some(reason),
        }
    }
}

/// Judgment for one metric of one submission.
///
/// `score` is `None` exactly when the status is [`MetricStatus::Failed`];
/// failed results carry zero confidence and are excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: Metric,
    pub score: Option<u8>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub improvement_advice: String,
    #[serde(default)]
    pub positive_examples: Vec<String>,
    #[serde(default)]
    pub improvement_examples: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub status: MetricStatus,
}

impl MetricResult {
    /// Result recorded when a metric could not be judged.
    pub fn failed(metric: Metric, reason: impl Into<String>) -> Self {
        Self {
            metric,
            score: None,
            reasoning: String::new(),
            improvement_advice: String::new(),
            positive_examples: Vec::new(),
            improvement_examples: Vec::new(),
            confidence: 0.0,
            status: MetricStatus::Failed(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Score usable for aggregation, if any.
    pub fn ok_score(&self) -> Option<u8> {
        match self.status {
            MetricStatus::Ok => self.score,
            MetricStatus::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric() -> Metric {
        Metric {
            name: "conciseness".to_string(),
            description: "Free of filler".to_string(),
            category: "clarity".to_string(),
            weight: 0.3,
        }
    }

    #[test]
    fn failed_result_has_no_score_and_zero_confidence() {
        let result = MetricResult::failed(metric(), "judge timed out");
        assert_eq!(result.score, None);
        assert_eq!(result.ok_score(), None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.status.failure_reason(), Some("judge timed out"));
    }

    #[test]
    fn status_serializes_with_reason() {
        let json = serde_json::to_value(MetricStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "reason": "boom"}));
        let ok = serde_json::to_value(MetricStatus::Ok).unwrap();
        assert_eq!(ok, serde_json::json!({"state": "ok"}));
    }

    #[test]
    fn result_without_status_field_defaults_to_ok() {
        let json = serde_json::json!({
            "metric": {"name": "conciseness", "description": "d", "category": "clarity", "weight": 0.3},
            "score": 4,
            "reasoning": "tight prose",
            "improvement_advice": "",
            "positive_examples": [],
            "improvement_examples": [],
            "confidence": 0.8
        });
        let result: MetricResult = serde_json::from_value(json).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.ok_score(), Some(4));
    }
}
