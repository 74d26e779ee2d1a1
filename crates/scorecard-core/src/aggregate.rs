//! Weighted aggregation of metric judgments.
//!
//! Only metrics with an `Ok` status contribute. A category without any
//! successful metric has no score at all (it is not zero) and is left out of
//! the overall mean. No rounding happens here.

use indexmap::IndexMap;

use crate::domain::{MetricResult, Result, ScorecardError};
use crate::guidelines::GuidelinesModel;

/// Scores derived from one set of metric results.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub overall_score: f64,
    /// In guidelines order.
    pub category_scores: IndexMap<String, f64>,
    pub metrics_evaluated: usize,
}

/// `Σ(weight × value) / Σ(weight)`, or `None` when nothing has weight.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (weighted, total) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(sum, weights), (weight, value)| {
            (sum + weight * value, weights + weight)
        });
    (total > 0.0).then(|| weighted / total)
}

/// Weighted mean of the successful scores among `results`.
pub fn category_score<'a, I>(results: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a MetricResult>,
{
    weighted_mean(
        results
            .into_iter()
            .filter_map(|r| r.ok_score().map(|score| (r.metric.weight, f64::from(score)))),
    )
}

/// Aggregate `results` under the category weights of `guidelines`.
///
/// Fails with [`ScorecardError::AllMetricsFailed`] when no category has a score.
pub fn aggregate(guidelines: &GuidelinesModel, results: &[MetricResult]) -> Result<Aggregate> {
    let mut category_scores = IndexMap::new();
    let mut overall_inputs = Vec::new();

    for category in guidelines.categories() {
        let score = category_score(
            results
                .iter()
                .filter(|r| r.metric.category == category.name),
        );
        if let Some(score) = score {
            category_scores.insert(category.name.clone(), score);
            overall_inputs.push((category.weight, score));
        }
    }

    let overall_score =
        weighted_mean(overall_inputs).ok_or(ScorecardError::AllMetricsFailed {
            requested: results.len(),
        })?;

    Ok(Aggregate {
        overall_score,
        category_scores,
        metrics_evaluated: results.iter().filter(|r| r.is_ok()).count(),
    })
}
