//! Descriptive statistics for one lift in one bucket.

use super::percentile::nearest_rank;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LiftSummary {
    /// Summarize an ascending sample; `None` when empty.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let mean = mean(sorted);
        Some(Self {
            count: sorted.len(),
            mean,
            median: median(sorted)?,
            min,
            max,
            std_dev: population_std_dev(sorted, mean),
            p25: nearest_rank(sorted, 25)?,
            p75: nearest_rank(sorted, 75)?,
            p90: nearest_rank(sorted, 90)?,
            p95: nearest_rank(sorted, 95)?,
            p99: nearest_rank(sorted, 99)?,
        })
    }

    pub fn interquartile_range(&self) -> f64 {
        self.p75 - self.p25
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`). Collapses to exactly zero
/// for constant samples.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std = variance.sqrt();
    if std < 1e-12 {
        0.0
    } else {
        std
    }
}

/// Middle value of an ascending slice; mean of the two middle values for even lengths.
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}
