//! Built-in guidelines and the fallback loader used by front ends.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Category, GuidelinesModel, GuidelinesSource};
use crate::domain::{Metric, Result};

type MetricRow = (&'static str, &'static str, f64);
type CategoryRow = (&'static str, f64, &'static str, &'static [MetricRow]);

const DEFAULT_CATEGORIES: &[CategoryRow] = &[
    (
        "clarity",
        1.0,
        "How clear and understandable is the content?",
        &[
            ("conciseness", "Is the writing free of unnecessary filler words and redundancy?", 0.3),
            ("jargon_usage", "Is technical jargon properly defined or avoided when appropriate?", 0.4),
            ("logical_structure", "Does the content follow a logical flow with clear headings and transitions?", 0.3),
        ],
    ),
    (
        "accuracy",
        1.2,
        "How factually correct and well-supported is the content?",
        &[
            ("data_support", "Are claims backed by credible data, sources, or evidence?", 0.6),
            ("fact_verification", "Are there any apparent factual errors or unsupported claims?", 0.4),
        ],
    ),
    (
        "engagement",
        0.9,
        "How engaging and compelling is the content for the target audience?",
        &[
            ("audience_relevance", "Is the content relevant and valuable to the intended audience?", 0.4),
            ("tone_appropriateness", "Is the tone appropriate for the content type and audience?", 0.3),
            ("call_to_action", "Does the content include clear next steps or calls to action where appropriate?", 0.3),
        ],
    ),
    (
        "completeness",
        1.1,
        "How complete and comprehensive is the content coverage?",
        &[
            ("topic_coverage", "Are all important aspects of the topic adequately covered?", 0.5),
            ("depth_analysis", "Is the analysis sufficiently detailed for the intended purpose?", 0.3),
            ("context_provision", "Is sufficient background context provided for understanding?", 0.2),
        ],
    ),
    (
        "readability",
        0.8,
        "How easy is the content to read and understand?",
        &[
            ("sentence_structure", "Are sentences well-constructed with appropriate length and complexity?", 0.4),
            ("paragraph_organization", "Are paragraphs well-organized with clear topic sentences?", 0.3),
            ("formatting_consistency", "Is formatting consistent and does it enhance readability?", 0.3),
        ],
    ),
];

/// The built-in model: five categories, fourteen metrics.
pub fn default_guidelines() -> GuidelinesModel {
    let categories = DEFAULT_CATEGORIES
        .iter()
        .map(|(name, weight, description, metrics)| Category {
            name: (*name).to_string(),
            weight: *weight,
            description: (*description).to_string(),
            metrics: metrics
                .iter()
                .map(|(metric, metric_description, metric_weight)| Metric {
                    name: (*metric).to_string(),
                    description: (*metric_description).to_string(),
                    category: (*name).to_string(),
                    weight: *metric_weight,
                })
                .collect(),
        })
        .collect();
    GuidelinesModel::from_validated(categories)
}

/// Where the guidelines handed to the coordinator came from.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidelinesOrigin {
    File(PathBuf),
    /// Built-in defaults; `reason` says why the file was not used.
    Default { reason: String },
}

/// Load guidelines from `path`, substituting [`default_guidelines`] when the
/// file is missing, empty or invalid.
///
/// Only an unreadable file (permissions, not-a-file) is an error.
pub fn load_guidelines_or_default(path: &Path) -> Result<(GuidelinesModel, GuidelinesOrigin)> {
    if !path.exists() {
        let reason = format!("{} not found", path.display());
        info!(path = %path.display(), "guidelines file not found, using defaults");
        return Ok((default_guidelines(), GuidelinesOrigin::Default { reason }));
    }

    let source = match GuidelinesSource::from_path(path) {
        Ok(source) => source,
        Err(crate::ScorecardError::Io(e)) => return Err(e.into()),
        Err(e) => return Ok(fallback(path, e.to_string())),
    };
    if source.is_empty() {
        return Ok(fallback(path, format!("{} is empty", path.display())));
    }

    match GuidelinesModel::load(source) {
        Ok(model) => {
            info!(
                path = %path.display(),
                categories = model.categories().len(),
                metrics = model.metric_count(),
                "loaded guidelines"
            );
            Ok((model, GuidelinesOrigin::File(path.to_path_buf())))
        }
        Err(e) => Ok(fallback(path, e.to_string())),
    }
}

fn fallback(path: &Path, reason: String) -> (GuidelinesModel, GuidelinesOrigin) {
    warn!(path = %path.display(), reason = %reason, "using default guidelines");
    (default_guidelines(), GuidelinesOrigin::Default { reason })
}
