//! Per-bucket statistics: percentile tables, summaries, histograms.
//!
//! Only positive lift values contribute to a lift's statistics; a record with
//! no bench (0.0) still counts toward the bucket's `sample_size` and its
//! other lifts. A lift with no positive values in a bucket has no statistics.

pub mod histogram;
pub mod percentile;
pub mod summary;

pub use histogram::{Histogram, DEFAULT_BIN_COUNT};
pub use percentile::{nearest_rank, nearest_rank_index, positive_sorted, PercentileTable, TableError, PERCENTILE_COUNT};
pub use summary::LiftSummary;

use crate::domain::{Lift, Record};
use serde::{Deserialize, Serialize};

/// Everything stored for one lift in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftStatistics {
    pub percentiles: PercentileTable,
    pub summary: LiftSummary,
    pub histogram: Histogram,
}

impl LiftStatistics {
    /// Compute from raw values; non-positive and non-finite values are ignored.
    pub fn compute(values: impl IntoIterator<Item = f64>, bins: usize) -> Option<Self> {
        let sorted = positive_sorted(values);
        Some(Self {
            percentiles: PercentileTable::from_sorted(&sorted)?,
            summary: LiftSummary::from_sorted(&sorted)?,
            histogram: Histogram::from_sorted(&sorted, bins)?,
        })
    }
}

/// Statistics for one filter key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBucket {
    /// Records in the group, including those missing some lifts.
    pub sample_size: usize,
    pub squat: Option<LiftStatistics>,
    pub bench: Option<LiftStatistics>,
    pub deadlift: Option<LiftStatistics>,
    pub total: Option<LiftStatistics>,
}

impl StatisticsBucket {
    pub fn from_records(records: &[&Record], bins: usize) -> Self {
        let lift = |l: Lift| LiftStatistics::compute(records.iter().map(|r| r.lift(l)), bins);
        Self {
            sample_size: records.len(),
            squat: lift(Lift::Squat),
            bench: lift(Lift::Bench),
            deadlift: lift(Lift::Deadlift),
            total: lift(Lift::Total),
        }
    }

    pub fn lift(&self, lift: Lift) -> Option<&LiftStatistics> {
        match lift {
            Lift::Squat => self.squat.as_ref(),
            Lift::Bench => self.bench.as_ref(),
            Lift::Deadlift => self.deadlift.as_ref(),
            Lift::Total => self.total.as_ref(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Sex, TestedStatus};

    fn record(squat: f64, bench: f64, deadlift: f64) -> Record {
        Record {
            sex: Sex::M,
            equipment: "Raw".into(),
            bodyweight_kg: 82.0,
            age_division: "Open".into(),
            tested: TestedStatus::Untested,
            country: None,
            state: None,
            federation: None,
            year: None,
            meet_name: None,
            squat_kg: squat,
            bench_kg: bench,
            deadlift_kg: deadlift,
            total_kg: squat + bench + deadlift,
        }
    }

    #[test]
    fn missing_lifts_do_not_shrink_sample_size() {
        let records = [record(200.0, 0.0, 250.0), record(180.0, 120.0, 230.0)];
        let refs: Vec<&Record> = records.iter().collect();
        let bucket = StatisticsBucket::from_records(&refs, 10);
        assert_eq!(bucket.sample_size, 2);
        assert_eq!(bucket.bench.as_ref().unwrap().summary.count, 1);
        assert_eq!(bucket.squat.as_ref().unwrap().summary.count, 2);
    }

    #[test]
    fn lift_without_positive_values_has_no_statistics() {
        let records = [record(200.0, 0.0, 250.0)];
        let refs: Vec<&Record> = records.iter().collect();
        let bucket = StatisticsBucket::from_records(&refs, 10);
        assert!(bucket.lift(Lift::Bench).is_none());
        assert!(bucket.lift(Lift::Total).is_some());
    }

    #[test]
    fn compute_ignores_non_positive_values() {
        let stats = LiftStatistics::compute([0.0, -1.0, 100.0, 110.0], 4).unwrap();
        assert_eq!(stats.summary.count, 2);
        assert_eq!(stats.percentiles.at(1), Some(100.0));
        assert_eq!(stats.histogram.total(), 2);
    }
}
