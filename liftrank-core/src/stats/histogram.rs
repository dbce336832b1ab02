//! Fixed-width histograms for distribution display.
//!
//! Bins span `[min, max]` of the sample. A value equal to `max` lands in the
//! last bin. A constant sample gets a one-kilogram window centred on the value.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BIN_COUNT: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` ascending edges.
    pub edges: Vec<f64>,
    /// Midpoint of each bin.
    pub centers: Vec<f64>,
    pub counts: Vec<u64>,
    /// `counts[i] / total`; sums to 1.
    pub frequencies: Vec<f64>,
}

impl Histogram {
    /// Bin an ascending sample; `None` when empty or `bins == 0`.
    pub fn from_sorted(sorted: &[f64], bins: usize) -> Option<Self> {
        if bins == 0 {
            return None;
        }
        let (&first, &last) = (sorted.first()?, sorted.last()?);
        let (lo, hi) = if last > first { (first, last) } else { (first - 0.5, first + 0.5) };
        let width = (hi - lo) / bins as f64;

        let mut edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        edges[bins] = hi;

        let mut counts = vec![0u64; bins];
        for &v in sorted {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let centers = edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        let total = sorted.len() as f64;
        let frequencies = counts.iter().map(|&c| c as f64 / total).collect();
        Some(Self { edges, centers, counts, frequencies })
    }

    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
