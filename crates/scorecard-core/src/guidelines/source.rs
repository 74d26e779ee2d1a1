//! Parsed-but-unvalidated guidelines in their on-disk shape.
//!
//! Accepts either the bare top-level mapping or the same mapping under a
//! `categories:` key. Category and metric order is preserved exactly as written.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::domain::{Result, ScorecardError};

const WRAPPER_KEY: &str = "categories";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSource {
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySource {
    pub name: String,
    pub weight: f64,
    pub description: String,
    /// Metric name → definition, in file order.
    pub metrics: Vec<(String, MetricSource)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuidelinesSource {
    pub categories: Vec<CategorySource>,
}

#[derive(Deserialize)]
struct RawCategory {
    weight: f64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metrics: Mapping,
}

impl GuidelinesSource {
    /// Parse YAML (or JSON, which is valid YAML) text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| invalid(format!("unparseable guidelines: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    fn from_value(value: Value) -> Result<Self> {
        let root = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => unwrap_categories(map),
            other => {
                return Err(invalid(format!(
                    "guidelines must be a mapping of categories, found {}",
                    kind(&other)
                )))
            }
        };

        let mut categories = Vec::with_capacity(root.len());
        for (key, value) in root {
            let name = key_string(&key, "category")?;
            let raw: RawCategory = serde_yaml::from_value(value)
                .map_err(|e| invalid(format!("category '{name}': {e}")))?;

            let mut metrics = Vec::with_capacity(raw.metrics.len());
            for (metric_key, metric_value) in raw.metrics {
                let metric_name = key_string(&metric_key, "metric")?;
                let metric: MetricSource = serde_yaml::from_value(metric_value).map_err(|e| {
                    invalid(format!("metric '{metric_name}' in category '{name}': {e}"))
                })?;
                metrics.push((metric_name, metric));
            }

            categories.push(CategorySource {
                name,
                weight: raw.weight,
                description: raw.description,
                metrics,
            });
        }

        Ok(Self { categories })
    }

    /// Serialize under a `categories:` key, preserving order.
    pub fn to_yaml(&self) -> Result<String> {
        let mut categories = Mapping::new();
        for category in &self.categories {
            let mut metrics = Mapping::new();
            for (name, metric) in &category.metrics {
                metrics.insert(Value::from(name.as_str()), serde_yaml::to_value(metric)?);
            }
            let mut body = Mapping::new();
            body.insert(Value::from("weight"), Value::from(category.weight));
            body.insert(
                Value::from("description"),
                Value::from(category.description.as_str()),
            );
            body.insert(Value::from("metrics"), Value::Mapping(metrics));
            categories.insert(Value::from(category.name.as_str()), Value::Mapping(body));
        }

        let mut root = Mapping::new();
        root.insert(Value::from(WRAPPER_KEY), Value::Mapping(categories));
        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Strip a lone `categories:` wrapper unless it is itself a category.
fn unwrap_categories(map: Mapping) -> Mapping {
    if map.len() == 1 {
        if let Some(Value::Mapping(inner)) = map.get(WRAPPER_KEY) {
            if !inner.contains_key("metrics") {
                return inner.clone();
            }
        }
    }
    map
}

fn key_string(key: &Value, what: &str) -> Result<String> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{what} names must be strings, found {}", kind(key))))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn invalid(message: String) -> ScorecardError {
    ScorecardError::GuidelinesInvalid(message)
}
