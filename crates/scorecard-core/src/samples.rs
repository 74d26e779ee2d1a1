//! Named sample contents for demos and smoke tests.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
}

/// Samples loaded from a YAML list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleLibrary {
    samples: Vec<Sample>,
}

impl SampleLibrary {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// A missing file yields an empty library; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "samples file not found, starting with no samples");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let samples: Option<Vec<Sample>> = serde_yaml::from_str(text)?;
        Ok(Self::new(samples.unwrap_or_default()))
    }

    pub fn all(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, id: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
