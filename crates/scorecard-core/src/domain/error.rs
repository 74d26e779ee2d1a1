//! Submission-level error taxonomy for the scorecard engine.

/// Errors that stop a submission (or a guidelines load) outright.
///
/// Metric-level judge failures never surface here from
/// [`Coordinator::evaluate_content`](crate::Coordinator::evaluate_content);
/// they are folded into a failed [`MetricResult`](crate::MetricResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum ScorecardError {
    #[error("invalid guidelines: {0}")]
    GuidelinesInvalid(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("metric '{metric}' evaluation failed: {reason}")]
    MetricEvaluationFailed { metric: String, reason: String },

    #[error("all {requested} requested metrics failed; no score was produced")]
    AllMetricsFailed { requested: usize },

    #[error("evaluation cancelled before all metrics completed")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScorecardError {
    /// Operator-facing hint for failures a user can act on.
    pub fn troubleshooting(&self) -> Option<&'static str> {
        match self {
            Self::AllMetricsFailed { .. } => Some(
                "every judge call failed: check that the provider is reachable \
                 (`scorecard check`), that the API key is valid and that the model name exists",
            ),
            Self::InvalidContent(_) => {
                Some("submit non-empty content within the configured length limits")
            }
            Self::GuidelinesInvalid(_) => Some(
                "fix the guidelines file or remove it to fall back to the built-in defaults",
            ),
            _ => None,
        }
    }
}

/// Result type for scorecard operations.
pub type Result<T> = std::result::Result<T, ScorecardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scorecard_error_display() {
        let err = ScorecardError::InvalidContent("content is empty".to_string());
        assert!(err.to_string().contains("invalid content"));

        let err = ScorecardError::AllMetricsFailed { requested: 14 };
        assert!(err.to_string().contains("all 14 requested metrics failed"));

        let err = ScorecardError::MetricEvaluationFailed {
            metric: "conciseness".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "metric 'conciseness' evaluation failed: timed out"
        );
    }

    #[test]
    fn test_troubleshooting_only_for_actionable_errors() {
        assert!(ScorecardError::AllMetricsFailed { requested: 1 }
            .troubleshooting()
            .is_some());
        assert!(ScorecardError::Cancelled.troubleshooting().is_none());
    }
}
