//! Value → percentile rank against a stored table.
//!
//! - at or below the 1st-percentile value: exactly 1
//! - at or above the 99th-percentile value: exactly 99
//! - equal to a table entry: that entry's percentile (lowest index on ties)
//! - strictly between two entries: linear interpolation, one decimal
//!
//! A missing or non-positive value, or a missing table, ranks as 0
//! ("not applicable").

use crate::domain::Lift;
use crate::stats::{PercentileTable, StatisticsBucket};
use serde::{Deserialize, Serialize};

/// Rank reported when no rank applies.
pub const NOT_APPLICABLE: f64 = 0.0;

/// Rank `value` against a stored 1..=99 table.
pub fn rank(table: &PercentileTable, value: f64) -> f64 {
    rank_against(table.values(), 1, value)
}

/// Rank `value` against an ascending list of values whose first entry sits at
/// `first_percentile`, the next at `first_percentile + 1`, and so on.
pub fn rank_against(values: &[f64], first_percentile: u32, value: f64) -> f64 {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return NOT_APPLICABLE;
    };
    if !value.is_finite() || value <= 0.0 {
        return NOT_APPLICABLE;
    }
    let lowest = first_percentile as f64;
    if value <= first {
        return lowest;
    }
    if value >= last {
        return lowest + (values.len() - 1) as f64;
    }

    // first < value < last, so 1 <= idx <= len - 1
    let idx = values.partition_point(|&v| v < value);
    if values[idx] == value {
        return lowest + idx as f64;
    }
    let lo = idx - 1;
    let fraction = (value - values[lo]) / (values[idx] - values[lo]);
    round_one_decimal(lowest + lo as f64 + fraction)
}

fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Lift values submitted for ranking; `None` means not attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiftValues {
    pub squat: Option<f64>,
    pub bench: Option<f64>,
    pub deadlift: Option<f64>,
    pub total: Option<f64>,
}

impl LiftValues {
    pub fn get(&self, lift: Lift) -> Option<f64> {
        match lift {
            Lift::Squat => self.squat,
            Lift::Bench => self.bench,
            Lift::Deadlift => self.deadlift,
            Lift::Total => self.total,
        }
    }
}

/// One rank per lift; `NOT_APPLICABLE` where no rank applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiftPercentiles {
    pub squat: f64,
    pub bench: f64,
    pub deadlift: f64,
    pub total: f64,
}

impl LiftPercentiles {
    pub fn get(&self, lift: Lift) -> f64 {
        match lift {
            Lift::Squat => self.squat,
            Lift::Bench => self.bench,
            Lift::Deadlift => self.deadlift,
            Lift::Total => self.total,
        }
    }
}

/// Rank every submitted lift against a bucket.
pub fn rank_bucket(bucket: &StatisticsBucket, values: &LiftValues) -> LiftPercentiles {
    let one = |lift: Lift| match (bucket.lift(lift), values.get(lift)) {
        (Some(stats), Some(v)) => rank(&stats.percentiles, v),
        _ => NOT_APPLICABLE,
    };
    LiftPercentiles {
        squat: one(Lift::Squat),
        bench: one(Lift::Bench),
        deadlift: one(Lift::Deadlift),
        total: one(Lift::Total),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: Vec<f64>) -> PercentileTable {
        PercentileTable::try_from(values).unwrap()
    }

    fn linear() -> PercentileTable {
        table((1..=99).map(|i| 100.0 + i as f64 * 2.0).collect())
    }

    #[test]
    fn clamps_at_both_ends() {
        let t = linear();
        assert_eq!(rank(&t, 1.0), 1.0);
        assert_eq!(rank(&t, 102.0), 1.0);
        assert_eq!(rank(&t, 298.0), 99.0);
        assert_eq!(rank(&t, 5000.0), 99.0);
    }

    #[test]
    fn exact_match_returns_its_percentile() {
        let t = linear();
        assert_eq!(rank(&t, 200.0), 50.0);
        assert_eq!(rank(&t, 280.0), 90.0);
    }

    #[test]
    fn interpolates_between_entries() {
        assert_eq!(rank_against(&[100.0, 110.0], 50, 105.0), 50.5);
        assert_eq!(rank(&linear(), 201.0), 50.5);
        assert_eq!(rank(&linear(), 200.5), 50.3);
    }

    #[test]
    fn ties_report_lowest_percentile() {
        let mut values: Vec<f64> = (1..=99).map(|i| i as f64).collect();
        for v in values.iter_mut().skip(39).take(5) {
            *v = 40.0;
        }
        // entries 40..=44 all hold 40.0
        let t = table(values);
        assert_eq!(rank(&t, 40.0), 40.0);
        assert!(rank(&t, 40.5) > 44.0);
    }

    #[test]
    fn invalid_values_are_not_applicable() {
        let t = linear();
        assert_eq!(rank(&t, 0.0), NOT_APPLICABLE);
        assert_eq!(rank(&t, -20.0), NOT_APPLICABLE);
        assert_eq!(rank(&t, f64::NAN), NOT_APPLICABLE);
        assert_eq!(rank_against(&[], 1, 100.0), NOT_APPLICABLE);
    }

    #[test]
    fn missing_lifts_rank_zero() {
        let bucket = StatisticsBucket {
            sample_size: 1,
            squat: None,
            bench: None,
            deadlift: None,
            total: None,
        };
        let values = LiftValues { squat: Some(200.0), ..Default::default() };
        assert_eq!(rank_bucket(&bucket, &values), LiftPercentiles::default());
    }
}
