//! Immutable, validated guidelines: categories → metrics → weights.
//!
//! [`GuidelinesModel::load`] only validates and rejects. Falling back to the
//! built-in model is the caller's decision, see [`load_guidelines_or_default`].

mod defaults;
mod source;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Metric, Result, ScorecardError};

pub use defaults::{default_guidelines, load_guidelines_or_default, GuidelinesOrigin};
pub use source::{CategorySource, GuidelinesSource, MetricSource};

/// Weighted grouping of related metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub weight: f64,
    pub description: String,
    pub metrics: Vec<Metric>,
}

/// Validated guidelines. Cheap to share by reference across concurrent tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidelinesModel {
    categories: Vec<Category>,
}

impl GuidelinesModel {
    /// Validate a parsed source and build the model.
    ///
    /// Fails with [`ScorecardError::GuidelinesInvalid`] when there are no
    /// categories, a category has no metrics, any weight is not strictly
    /// positive, or a metric name repeats anywhere in the model.
    pub fn load(source: GuidelinesSource) -> Result<Self> {
        if source.categories.is_empty() {
            return Err(invalid("guidelines define no categories"));
        }

        let mut category_names = HashSet::new();
        let mut metric_names = HashSet::new();
        let mut categories = Vec::with_capacity(source.categories.len());

        for category in source.categories {
            let name = category.name.trim().to_string();
            if name.is_empty() {
                return Err(invalid("category name must not be empty"));
            }
            if !category_names.insert(name.clone()) {
                return Err(invalid(format!("duplicate category '{name}'")));
            }
            check_weight(category.weight, || format!("category '{name}'"))?;
            if category.metrics.is_empty() {
                return Err(invalid(format!("category '{name}' has no metrics")));
            }

            let mut metrics = Vec::with_capacity(category.metrics.len());
            for (metric_name, metric) in category.metrics {
                let metric_name = metric_name.trim().to_string();
                if metric_name.is_empty() {
                    return Err(invalid(format!(
                        "category '{name}' contains a metric with an empty name"
                    )));
                }
                if !metric_names.insert(metric_name.clone()) {
                    return Err(invalid(format!(
                        "metric '{metric_name}' is defined more than once"
                    )));
                }
                check_weight(metric.weight, || format!("metric '{metric_name}'"))?;
                metrics.push(Metric {
                    name: metric_name,
                    description: metric.description,
                    category: name.clone(),
                    weight: metric.weight,
                });
            }

            categories.push(Category {
                name,
                weight: category.weight,
                description: category.description,
                metrics,
            });
        }

        Ok(Self { categories })
    }

    /// Parse YAML or JSON text and validate it.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Self::load(GuidelinesSource::from_yaml_str(text)?)
    }

    /// Build from categories that are valid by construction.
    pub(crate) fn from_validated(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Every metric in canonical (category, then metric) order.
    pub fn all_metrics(&self) -> Vec<Metric> {
        self.categories
            .iter()
            .flat_map(|c| c.metrics.iter().cloned())
            .collect()
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.categories
            .iter()
            .flat_map(|c| c.metrics.iter())
            .find(|m| m.name == name)
    }

    pub fn metric_count(&self) -> usize {
        self.categories.iter().map(|c| c.metrics.len()).sum()
    }

    /// Sub-model containing only the named metrics, in canonical order.
    ///
    /// Categories left without metrics are dropped. Unknown names are an
    /// error so a typo never silently evaluates fewer metrics than asked for.
    pub fn restrict_to<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let unknown: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| self.metric(n).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(invalid(format!("unknown metrics: {}", unknown.join(", "))));
        }
        if wanted.is_empty() {
            return Err(invalid("no metrics selected"));
        }

        let categories = self
            .categories
            .iter()
            .filter_map(|category| {
                let metrics: Vec<Metric> = category
                    .metrics
                    .iter()
                    .filter(|m| wanted.contains(m.name.as_str()))
                    .cloned()
                    .collect();
                (!metrics.is_empty()).then(|| Category {
                    metrics,
                    ..category.clone()
                })
            })
            .collect();

        Ok(Self { categories })
    }

    /// Convert back into the source shape, preserving order.
    pub fn to_source(&self) -> GuidelinesSource {
        GuidelinesSource {
            categories: self
                .categories
                .iter()
                .map(|c| CategorySource {
                    name: c.name.clone(),
                    weight: c.weight,
                    description: c.description.clone(),
                    metrics: c
                        .metrics
                        .iter()
                        .map(|m| {
                            (
                                m.name.clone(),
                                MetricSource {
                                    description: m.description.clone(),
                                    weight: m.weight,
                                },
                            )
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.to_source().to_yaml()
    }
}

fn check_weight(weight: f64, owner: impl FnOnce() -> String) -> Result<()> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} weight must be positive, got {weight}",
            owner()
        )))
    }
}

fn invalid(message: impl Into<String>) -> ScorecardError {
    ScorecardError::GuidelinesInvalid(message.into())
}
