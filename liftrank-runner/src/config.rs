//! Aggregation configuration (TOML).
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! histogram_bins = 40
//! min_extended_sample = 10
//! max_extended_dimensions = 2
//! total_tolerance_kg = 0.5
//! threads = 8
//!
//! [weight_classes]
//! male = [59, 66, 74, 83, 93, 105, 120, 999]
//! female = [47, 52, 57, 63, 72, 84, 999]
//! ```

use liftrank_core::classify::{AgeDivisionTable, WeightClassTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Histogram bins per lift.
    pub histogram_bins: usize,
    /// Extended groups smaller than this are not materialized.
    pub min_extended_sample: usize,
    /// Largest number of extended dimensions combined in one key; 0 disables
    /// extended groups.
    pub max_extended_dimensions: usize,
    /// Allowed gap between the stated total and the sum of the three lifts.
    pub total_tolerance_kg: f64,
    /// Worker threads for group statistics; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    pub weight_classes: WeightClassTable,
    pub age_divisions: AgeDivisionTable,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            histogram_bins: liftrank_core::stats::DEFAULT_BIN_COUNT,
            min_extended_sample: 10,
            max_extended_dimensions: 2,
            total_tolerance_kg: 0.5,
            threads: None,
            weight_classes: WeightClassTable::default(),
            age_divisions: AgeDivisionTable::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weight_classes
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.histogram_bins == 0 {
            return Err(ConfigError::Invalid("histogram_bins must be at least 1".into()));
        }
        if self.min_extended_sample == 0 {
            return Err(ConfigError::Invalid("min_extended_sample must be at least 1".into()));
        }
        if !self.total_tolerance_kg.is_finite() || self.total_tolerance_kg < 0.0 {
            return Err(ConfigError::Invalid("total_tolerance_kg must be a non-negative number".into()));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1 when set".into()));
        }
        if self.age_divisions.default_division.trim().is_empty() {
            return Err(ConfigError::Invalid("age_divisions.default_division is empty".into()));
        }
        Ok(())
    }
}
