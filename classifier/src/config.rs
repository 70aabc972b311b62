//! Configuration for the embedding classifier.

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

/// Scoring and filtering knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Maximum number of labels to return.
    pub max_results: usize,

    /// Minimum aggregated score (0.0 to 1.0).
    pub min_score: f32,

    /// Weight of the mean example score; the max gets the rest.
    pub mean_to_max_score_ratio: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_results: 1,
            min_score: 0.0,
            mean_to_max_score_ratio: 0.5,
        }
    }
}

impl ClassifierConfig {
    /// Set the maximum number of labels returned.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the minimum score.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the mean-to-max weighting.
    pub fn with_mean_to_max_score_ratio(mut self, ratio: f32) -> Self {
        self.mean_to_max_score_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(ClassifierError::Config(
                "max_results must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("min_score", self.min_score),
            ("mean_to_max_score_ratio", self.mean_to_max_score_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ClassifierError::Config(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Blend the mean and max example scores of one label.
    pub fn aggregate(&self, mean: f32, max: f32) -> f32 {
        self.mean_to_max_score_ratio * mean + (1.0 - self.mean_to_max_score_ratio) * max
    }
}
