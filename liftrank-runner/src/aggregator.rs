//! Aggregation run: records → immutable `StatisticsStore`.
//!
//! Phases:
//! 1. Validate and classify every record; malformed records are discarded and
//!    counted per reason, never raised.
//! 2. Partition by base key, pool every division into its Open group, and compute each group's statistics in parallel
//!    (rayon), in chunks so cancellation and progress are checked between them.
//!    Each group also yields its extended subgroups (every non-empty subset of
//!    extended dimensions up to the configured size) that reach the minimum
//!    sample, plus its slice of the option index.
//! 3. Merge, build metadata, stamp the content version.
//!
//! Identical input always yields identical buckets and the same version.

use crate::config::{AggregatorConfig, ConfigError};
use crate::metadata::build_metadata;
use liftrank_core::classify::OPEN_DIVISION;
use liftrank_core::domain::{BaseKey, ExtendedDimension, ExtendedKey, FilterKey, Record};
use liftrank_core::options::OptionIndex;
use liftrank_core::stats::StatisticsBucket;
use liftrank_core::store::{BucketCounts, StatisticsStore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

/// Base groups computed between cancellation checks.
const GROUP_CHUNK: usize = 64;

// ─── Validation ──────────────────────────────────────────────────────

/// Why a record was left out of the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    MissingEquipment,
    MissingAgeDivision,
    InvalidBodyweight,
    InvalidLift,
    NonPositiveTotal,
    InconsistentTotal,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::MissingEquipment => "missing_equipment",
            DiscardReason::MissingAgeDivision => "missing_age_division",
            DiscardReason::InvalidBodyweight => "invalid_bodyweight",
            DiscardReason::InvalidLift => "invalid_lift",
            DiscardReason::NonPositiveTotal => "non_positive_total",
            DiscardReason::InconsistentTotal => "inconsistent_total",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate one record and return its weight class.
///
/// The total must match the sum of the three lifts within tolerance, unless
/// no individual lift was recorded at all (total-only results).
pub fn validate_record(record: &Record, config: &AggregatorConfig) -> Result<String, DiscardReason> {
    if record.equipment.trim().is_empty() {
        return Err(DiscardReason::MissingEquipment);
    }
    if record.age_division.trim().is_empty() {
        return Err(DiscardReason::MissingAgeDivision);
    }
    let lifts = [record.squat_kg, record.bench_kg, record.deadlift_kg, record.total_kg];
    if lifts.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(DiscardReason::InvalidLift);
    }
    if record.total_kg <= 0.0 {
        return Err(DiscardReason::NonPositiveTotal);
    }
    let sum = record.squat_kg + record.bench_kg + record.deadlift_kg;
    if sum > 0.0 && (sum - record.total_kg).abs() > config.total_tolerance_kg {
        return Err(DiscardReason::InconsistentTotal);
    }
    config
        .weight_classes
        .classify(record.sex, record.bodyweight_kg)
        .map_err(|_| DiscardReason::InvalidBodyweight)
}

// ─── Extended grouping ───────────────────────────────────────────────

/// Every non-empty subset of extended dimensions with at most `max_dims`
/// members, in a fixed order.
pub fn dimension_subsets(max_dims: usize) -> Vec<Vec<ExtendedDimension>> {
    let all = ExtendedDimension::ALL;
    (1u32..(1 << all.len()))
        .filter(|mask| mask.count_ones() as usize <= max_dims)
        .map(|mask| {
            all.iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, d)| *d)
                .collect()
        })
        .collect()
}

/// Partition a base group's members by every extended key they project onto.
pub fn extended_groups<'r>(
    members: &[&'r Record],
    subsets: &[Vec<ExtendedDimension>],
) -> BTreeMap<ExtendedKey, Vec<&'r Record>> {
    let mut out: BTreeMap<ExtendedKey, Vec<&'r Record>> = BTreeMap::new();
    for &record in members {
        for dims in subsets {
            if let Some(key) = ExtendedKey::project(record, dims) {
                out.entry(key).or_default().push(record);
            }
        }
    }
    out
}

/// Add each non-Open group's members to the Open group of the same slice.
///
/// Open is the division every lifter may enter, so its groups hold every age
/// and back the age wildcard.
pub fn pool_open_division<'r>(groups: &[(BaseKey, Vec<&'r Record>)]) -> Vec<(BaseKey, Vec<&'r Record>)> {
    let mut pooled: BTreeMap<BaseKey, Vec<&'r Record>> = groups.iter().cloned().collect();
    for (key, members) in groups {
        if key.age_division != OPEN_DIVISION {
            let open = BaseKey {
                age_division: OPEN_DIVISION.to_string(),
                ..key.clone()
            };
            pooled.entry(open).or_default().extend(members.iter().copied());
        }
    }
    pooled.into_iter().collect()
}

struct GroupOutput {
    buckets: Vec<(FilterKey, StatisticsBucket)>,
    options: OptionIndex,
    extended_skipped: usize,
}

fn compute_group(
    key: &BaseKey,
    members: &[&Record],
    subsets: &[Vec<ExtendedDimension>],
    config: &AggregatorConfig,
) -> GroupOutput {
    let bins = config.histogram_bins;
    let mut buckets = vec![(FilterKey::base(key.clone()), StatisticsBucket::from_records(members, bins))];

    let mut options = OptionIndex::new();
    for record in members {
        options.insert(record, &key.weight_class);
    }

    let mut extended_skipped = 0;
    for (extended, subgroup) in extended_groups(members, subsets) {
        if subgroup.len() >= config.min_extended_sample {
            let bucket = StatisticsBucket::from_records(&subgroup, bins);
            buckets.push((FilterKey::new(key.clone(), extended), bucket));
        } else {
            extended_skipped += 1;
        }
    }

    GroupOutput { buckets, options, extended_skipped }
}

// ─── Progress & result types ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatePhase {
    Validating,
    Computing,
    Finalizing,
}

/// Progress update sent during an aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateProgress {
    pub phase: AggregatePhase,
    pub groups_done: usize,
    pub groups_total: usize,
    pub buckets_written: usize,
    pub elapsed_secs: f64,
}

/// Counts describing one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub records_in: usize,
    pub records_accepted: usize,
    pub discarded: BTreeMap<DiscardReason, usize>,
    pub base_buckets: usize,
    pub extended_buckets: usize,
    /// Extended groups left out for being below the minimum sample.
    pub extended_groups_skipped: usize,
    pub elapsed_secs: f64,
}

impl AggregateReport {
    pub fn discarded_total(&self) -> usize {
        self.discarded.values().sum()
    }
}

pub struct AggregateOutcome {
    pub store: StatisticsStore,
    pub report: AggregateReport,
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no records provided")]
    EmptyInput,
    #[error("all {discarded} records were invalid")]
    NoValidRecords { discarded: usize },
    #[error("aggregation cancelled")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
    #[error("failed to fingerprint snapshot: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

fn check_cancel(cancel: Option<&AtomicBool>, phase: AggregatePhase) -> Result<(), AggregateError> {
    if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
        tracing::info!(event = "aggregation_cancelled", phase = ?phase, "aggregation cancelled");
        return Err(AggregateError::Cancelled);
    }
    Ok(())
}

// ─── Core aggregation run ────────────────────────────────────────────

/// Build a statistics store from records.
///
/// # Arguments
/// - `records`: cleaned input records.
/// - `config`: class tables, thresholds, threading.
/// - `progress_cb`: Optional callback for progress updates (throttled to ~500ms).
/// - `cancel`: Optional atomic flag to stop the run cooperatively.
pub fn run_aggregation(
    records: &[Record],
    config: &AggregatorConfig,
    progress_cb: Option<&dyn Fn(&AggregateProgress)>,
    cancel: Option<&AtomicBool>,
) -> Result<AggregateOutcome, AggregateError> {
    config.validate()?;
    if records.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    let start_time = Instant::now();
    tracing::info!(event = "aggregation_started", records = records.len(), "starting aggregation");

    // Phase 1: validate and partition
    let mut discarded: BTreeMap<DiscardReason, usize> = BTreeMap::new();
    let mut groups: BTreeMap<BaseKey, Vec<&Record>> = BTreeMap::new();
    for record in records {
        match validate_record(record, config) {
            Ok(weight_class) => {
                let key = BaseKey::new(
                    record.sex,
                    record.equipment.clone(),
                    weight_class,
                    record.age_division.clone(),
                    record.tested,
                );
                groups.entry(key).or_default().push(record);
            }
            Err(reason) => *discarded.entry(reason).or_default() += 1,
        }
    }
    let accepted: usize = groups.values().map(Vec::len).sum();
    let discarded_total: usize = discarded.values().sum();
    if discarded_total > 0 {
        tracing::warn!(
            event = "records_discarded",
            discarded = discarded_total,
            reasons = ?discarded,
            "discarded malformed records"
        );
    }
    if accepted == 0 {
        return Err(AggregateError::NoValidRecords { discarded: discarded_total });
    }
    if let Some(cb) = progress_cb {
        cb(&AggregateProgress {
            phase: AggregatePhase::Validating,
            groups_done: 0,
            groups_total: groups.len(),
            buckets_written: 0,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
        });
    }
    check_cancel(cancel, AggregatePhase::Validating)?;

    // Phase 2: group statistics
    let thread_pool = match config.threads {
        Some(n) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AggregateError::ThreadPool(e.to_string()))?,
        ),
        None => None,
    };

    let own_groups: Vec<(BaseKey, Vec<&Record>)> = groups.into_iter().collect();
    let group_list = pool_open_division(&own_groups);
    let groups_total = group_list.len();
    let subsets = dimension_subsets(config.max_extended_dimensions);

    let mut buckets: BTreeMap<FilterKey, StatisticsBucket> = BTreeMap::new();
    let mut options = OptionIndex::new();
    let mut extended_skipped = 0usize;
    let mut groups_done = 0usize;
    let mut last_progress = Instant::now();

    for chunk in group_list.chunks(GROUP_CHUNK) {
        check_cancel(cancel, AggregatePhase::Computing)?;

        let compute = || {
            chunk
                .par_iter()
                .map(|(key, members)| compute_group(key, members, &subsets, config))
                .collect::<Vec<GroupOutput>>()
        };
        let outputs = match &thread_pool {
            Some(tp) => tp.install(compute),
            None => compute(),
        };

        for output in outputs {
            buckets.extend(output.buckets);
            options.merge(output.options);
            extended_skipped += output.extended_skipped;
        }
        groups_done += chunk.len();

        // Progress callback (throttled to 500ms)
        if let Some(cb) = progress_cb {
            if last_progress.elapsed().as_millis() >= 500 || groups_done == groups_total {
                cb(&AggregateProgress {
                    phase: AggregatePhase::Computing,
                    groups_done,
                    groups_total,
                    buckets_written: buckets.len(),
                    elapsed_secs: start_time.elapsed().as_secs_f64(),
                });
                last_progress = Instant::now();
            }
        }
    }
    check_cancel(cancel, AggregatePhase::Finalizing)?;

    // Phase 3: metadata and version
    let base_buckets = buckets.keys().filter(|k| !k.is_extended()).count();
    let bucket_counts = BucketCounts {
        base: base_buckets,
        extended: buckets.len() - base_buckets,
    };
    let metadata = build_metadata(records, &own_groups, &discarded, bucket_counts, config)?;
    let store = StatisticsStore::new(chrono::Utc::now(), metadata, buckets, options)?;

    let elapsed_secs = start_time.elapsed().as_secs_f64();
    if let Some(cb) = progress_cb {
        cb(&AggregateProgress {
            phase: AggregatePhase::Finalizing,
            groups_done,
            groups_total,
            buckets_written: store.len(),
            elapsed_secs,
        });
    }
    tracing::info!(
        event = "aggregation_finished",
        version = store.version.short(),
        base_buckets = bucket_counts.base,
        extended_buckets = bucket_counts.extended,
        accepted,
        discarded = discarded_total,
        elapsed_secs,
        "aggregation finished"
    );

    Ok(AggregateOutcome {
        report: AggregateReport {
            records_in: records.len(),
            records_accepted: accepted,
            discarded,
            base_buckets: bucket_counts.base,
            extended_buckets: bucket_counts.extended,
            extended_groups_skipped: extended_skipped,
            elapsed_secs,
        },
        store,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────
