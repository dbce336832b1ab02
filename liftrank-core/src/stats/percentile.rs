//! Nearest-rank percentile tables.
//!
//! For a sorted sample of size `n`, percentile `p` is the value at 1-based
//! position `ceil(p * n / 100)`, clamped to `[1, n]`. Every reported value is
//! therefore an observed value. Tables hold percentiles 1..=99.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of entries in a table (percentiles 1 through 99).
pub const PERCENTILE_COUNT: usize = 99;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("percentile table must have {PERCENTILE_COUNT} entries, got {0}")]
    WrongLength(usize),
    #[error("percentile table entry {index} is not finite")]
    NotFinite { index: usize },
    #[error("percentile table decreases at entry {index}")]
    Decreasing { index: usize },
}

/// Zero-based index of the nearest-rank percentile `p` (1..=100) in a sorted
/// sample of length `n`. `n` must be non-zero.
pub fn nearest_rank_index(p: u32, n: usize) -> usize {
    // ceil(p * n / 100) in integer arithmetic
    let rank = (p as usize * n).div_ceil(100);
    rank.clamp(1, n) - 1
}

/// Nearest-rank percentile of an ascending slice; `None` when empty.
pub fn nearest_rank(sorted: &[f64], p: u32) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[nearest_rank_index(p, sorted.len())])
}

/// Keep positive finite values and sort them ascending.
pub fn positive_sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().filter(|v| v.is_finite() && *v > 0.0).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Values at percentiles 1..=99, non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct PercentileTable(Vec<f64>);

impl PercentileTable {
    /// Build from an ascending sample; `None` for an empty sample.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let values = (1..=PERCENTILE_COUNT as u32)
            .map(|p| sorted[nearest_rank_index(p, sorted.len())])
            .collect();
        Some(Self(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Value at a 1-based percentile.
    pub fn at(&self, percentile: u32) -> Option<f64> {
        let index = (percentile as usize).checked_sub(1)?;
        self.0.get(index).copied()
    }
}

impl TryFrom<Vec<f64>> for PercentileTable {
    type Error = TableError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        if values.len() != PERCENTILE_COUNT {
            return Err(TableError::WrongLength(values.len()));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(TableError::NotFinite { index });
        }
        if let Some(index) = values.windows(2).position(|w| w[1] < w[0]) {
            return Err(TableError::Decreasing { index: index + 1 });
        }
        Ok(Self(values))
    }
}

impl From<PercentileTable> for Vec<f64> {
    fn from(table: PercentileTable) -> Self {
        table.0
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
