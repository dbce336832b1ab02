//! Statistics store schema: the immutable product of one aggregation run.
//!
//! Serialized layout:
//!
//! ```text
//! { schema_version, version, generated_at,
//!   metadata: { … },
//!   buckets: { "<canonical key>": { sample_size, squat, bench, deadlift, total } },
//!   options: [ [scope, [tuple, …]], … ] }
//! ```

use crate::classify::WeightClassTable;
use crate::domain::{FilterKey, SnapshotVersion, TestedStatus};
use crate::fingerprint::snapshot_version;
use crate::options::OptionIndex;
use crate::resolver::BucketLookup;
use crate::stats::StatisticsBucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the serialized layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub input: usize,
    pub accepted: usize,
    /// Discarded records by reason.
    pub discarded: BTreeMap<String, usize>,
}

impl RecordCounts {
    pub fn discarded_total(&self) -> usize {
        self.discarded.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub base: usize,
    pub extended: usize,
}

/// Record count and mean of each lift (positive values only) for one slice
/// of the accepted records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub count: usize,
    pub mean_squat: f64,
    pub mean_bench: f64,
    pub mean_deadlift: f64,
    pub mean_total: f64,
}

/// Global enumerations and run facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub equipment_types: Vec<String>,
    pub age_divisions: Vec<String>,
    pub tested_statuses: Vec<TestedStatus>,
    /// Labels per sex ("M"/"F"), lightest first, plus class last.
    pub weight_classes: BTreeMap<String, Vec<String>>,
    pub countries: Vec<String>,
    pub federations: Vec<String>,
    /// Most recent first.
    pub years: Vec<i32>,
    pub states_by_country: BTreeMap<String, Vec<String>>,
    pub year_range: Option<YearRange>,
    pub records: RecordCounts,
    pub buckets: BucketCounts,
    pub by_sex: BTreeMap<String, GroupSummary>,
    pub by_equipment: BTreeMap<String, GroupSummary>,
    pub by_age_division: BTreeMap<String, GroupSummary>,
    /// Class table the buckets were built with; queries classify with it.
    pub weight_class_table: WeightClassTable,
    pub min_extended_sample: usize,
    pub input_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsStore {
    pub schema_version: u32,
    pub version: SnapshotVersion,
    pub generated_at: DateTime<Utc>,
    pub metadata: StoreMetadata,
    pub buckets: BTreeMap<FilterKey, StatisticsBucket>,
    pub options: OptionIndex,
}

impl StatisticsStore {
    /// Assemble a snapshot and stamp its content version.
    pub fn new(
        generated_at: DateTime<Utc>,
        metadata: StoreMetadata,
        buckets: BTreeMap<FilterKey, StatisticsBucket>,
        options: OptionIndex,
    ) -> Result<Self, serde_json::Error> {
        let version = snapshot_version(&buckets, &options)?;
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            version,
            generated_at,
            metadata,
            buckets,
            options,
        })
    }

    pub fn get(&self, key: &FilterKey) -> Option<&StatisticsBucket> {
        self.buckets.get(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Recompute the content hash and compare with the stored one.
    pub fn version_matches(&self) -> Result<bool, serde_json::Error> {
        Ok(snapshot_version(&self.buckets, &self.options)? == self.version)
    }
}

impl BucketLookup for StatisticsStore {
    fn bucket(&self, key: &FilterKey) -> Option<&StatisticsBucket> {
        self.get(key)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseKey, Sex};
    use crate::stats::LiftStatistics;
    use chrono::TimeZone;

    fn sample_store(at: DateTime<Utc>) -> StatisticsStore {
        let squats: Vec<f64> = (1..=50).map(|i| 100.0 + i as f64).collect();
        let bucket = StatisticsBucket {
            sample_size: 50,
            squat: LiftStatistics::compute(squats, 10),
            bench: None,
            deadlift: None,
            total: None,
        };
        let mut buckets = BTreeMap::new();
        buckets.insert(
            FilterKey::base(BaseKey::new(Sex::M, "Raw", "83", "Open", TestedStatus::Untested)),
            bucket,
        );
        StatisticsStore::new(at, StoreMetadata::default(), buckets, OptionIndex::new()).unwrap()
    }

    #[test]
    fn version_excludes_timestamp() {
        let a = sample_store(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let b = sample_store(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(a.version, b.version);
        assert_ne!(a.generated_at, b.generated_at);
    }

    #[test]
    fn json_round_trip_preserves_store() {
        let store = sample_store(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.contains("\"M|Raw|83|Open|Untested\""));
        let back: StatisticsStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
        assert!(back.version_matches().unwrap());
    }

    #[test]
    fn tampered_content_fails_version_check() {
        let mut store = sample_store(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        if let Some(bucket) = store.buckets.values_mut().next() {
            bucket.sample_size += 1;
        }
        assert!(!store.version_matches().unwrap());
    }
}
