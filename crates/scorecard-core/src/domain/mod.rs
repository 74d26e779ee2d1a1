//! Domain types shared by every scorecard component.

pub mod error;
pub mod evaluation;
pub mod metric;

pub use error::{Result, ScorecardError};
pub use evaluation::{EvaluationMetadata, EvaluationResult};
pub use metric::{Metric, MetricResult, MetricStatus, MAX_SCORE, MIN_SCORE};
