//! Integration tests for aggregation runs: determinism, discards,
//! extended-group thresholds, cancellation and progress.

use liftrank_core::domain::{BaseKey, ExtendedKey, FilterKey, Record, Sex, TestedStatus};
use liftrank_runner::{
    generate_synthetic_records, run_aggregation, AggregateError, AggregatePhase, AggregatorConfig, DiscardReason,
};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

fn lifter(squat: f64) -> Record {
    Record {
        sex: Sex::M,
        equipment: "Raw".into(),
        bodyweight_kg: 80.0,
        age_division: "Open".into(),
        tested: TestedStatus::Untested,
        country: None,
        state: None,
        federation: None,
        year: Some(2023),
        meet_name: None,
        squat_kg: squat,
        bench_kg: 100.0,
        deadlift_kg: 200.0,
        total_kg: squat + 300.0,
    }
}

fn base_key() -> FilterKey {
    FilterKey::base(BaseKey::new(Sex::M, "Raw", "83", "Open", TestedStatus::Untested))
}

// ── 1. Determinism ──

#[test]
fn identical_input_gives_identical_store() {
    let config = AggregatorConfig::default();
    let records = generate_synthetic_records(3_000, 11, &config);

    let a = run_aggregation(&records, &config, None, None).unwrap();
    let b = run_aggregation(&records, &config, None, None).unwrap();

    assert_eq!(a.store.version, b.store.version);
    assert_eq!(a.store.buckets, b.store.buckets);
    assert_eq!(a.store.options, b.store.options);
    assert_eq!(a.store.metadata, b.store.metadata);
}

#[test]
fn thread_cap_does_not_change_results() {
    let records = generate_synthetic_records(2_000, 5, &AggregatorConfig::default());
    let pooled = AggregatorConfig { threads: Some(2), ..Default::default() };

    let global = run_aggregation(&records, &AggregatorConfig::default(), None, None).unwrap();
    let capped = run_aggregation(&records, &pooled, None, None).unwrap();
    assert_eq!(global.store.version, capped.store.version);
}

#[test]
fn different_input_gives_different_version() {
    let config = AggregatorConfig::default();
    let a = run_aggregation(&generate_synthetic_records(500, 1, &config), &config, None, None).unwrap();
    let b = run_aggregation(&generate_synthetic_records(500, 2, &config), &config, None, None).unwrap();
    assert_ne!(a.store.version, b.store.version);
    assert_ne!(a.store.metadata.input_hash, b.store.metadata.input_hash);
}

// ── 2. Percentile tables ──

#[test]
fn thousand_records_build_exact_nearest_rank_table() {
    let records: Vec<Record> = (1..=1000).map(|i| lifter(i as f64)).collect();
    let outcome = run_aggregation(&records, &AggregatorConfig::default(), None, None).unwrap();

    let bucket = outcome.store.get(&base_key()).unwrap();
    assert_eq!(bucket.sample_size, 1000);
    let squat = bucket.squat.as_ref().unwrap();
    assert_eq!(squat.percentiles.at(90), Some(900.0));
    assert_eq!(squat.percentiles.at(1), Some(10.0));
    assert_eq!(squat.percentiles.at(99), Some(990.0));
    assert_eq!(squat.summary.count, 1000);
    assert_eq!(squat.histogram.total(), 1000);
}

#[test]
fn zero_lifts_are_excluded_from_that_lift_only() {
    let mut records: Vec<Record> = (1..=20).map(|i| lifter(100.0 + i as f64)).collect();
    for r in records.iter_mut().take(5) {
        r.total_kg -= r.squat_kg;
        r.squat_kg = 0.0;
    }
    let outcome = run_aggregation(&records, &AggregatorConfig::default(), None, None).unwrap();
    let bucket = outcome.store.get(&base_key()).unwrap();
    assert_eq!(bucket.sample_size, 20);
    assert_eq!(bucket.squat.as_ref().unwrap().summary.count, 15);
    assert_eq!(bucket.bench.as_ref().unwrap().summary.count, 20);
}

// ── 3. Discards ──

#[test]
fn malformed_records_are_counted_not_fatal() {
    let mut records: Vec<Record> = (1..=10).map(|i| lifter(150.0 + i as f64)).collect();
    let mut bad_bw = lifter(150.0);
    bad_bw.bodyweight_kg = -1.0;
    let mut bad_total = lifter(150.0);
    bad_total.total_kg = 9999.0;
    records.extend([bad_bw.clone(), bad_bw, bad_total]);

    let outcome = run_aggregation(&records, &AggregatorConfig::default(), None, None).unwrap();
    let report = &outcome.report;
    assert_eq!(report.records_in, 13);
    assert_eq!(report.records_accepted, 10);
    assert_eq!(report.discarded[&DiscardReason::InvalidBodyweight], 2);
    assert_eq!(report.discarded[&DiscardReason::InconsistentTotal], 1);
    assert_eq!(outcome.store.metadata.records.discarded_total(), 3);
    assert_eq!(outcome.store.get(&base_key()).unwrap().sample_size, 10);
}

// ── 4. Extended groups ──

#[test]
fn small_extended_groups_are_never_materialized() {
    let mut records: Vec<Record> = (1..=30).map(|i| lifter(150.0 + i as f64)).collect();
    for r in records.iter_mut().take(12) {
        r.country = Some("USA".into());
    }
    records[29].country = Some("Norway".into());

    let outcome = run_aggregation(&records, &AggregatorConfig::default(), None, None).unwrap();
    let store = &outcome.store;

    let usa = FilterKey::new(
        base_key().base,
        ExtendedKey { country: Some("USA".into()), ..Default::default() },
    );
    let norway = FilterKey::new(
        base_key().base,
        ExtendedKey { country: Some("Norway".into()), ..Default::default() },
    );
    assert_eq!(store.get(&usa).unwrap().sample_size, 12);
    assert!(store.get(&norway).is_none());
    assert!(outcome.report.extended_groups_skipped >= 1);
    assert!(store.buckets.iter().all(|(k, b)| !k.is_extended() || b.sample_size >= 10));
}

#[test]
fn extended_dimension_subsets_respect_the_bound() {
    let config = AggregatorConfig { max_extended_dimensions: 1, min_extended_sample: 1, ..Default::default() };
    let mut records: Vec<Record> = (1..=5).map(|i| lifter(150.0 + i as f64)).collect();
    for r in &mut records {
        r.country = Some("USA".into());
        r.federation = Some("USAPL".into());
    }
    let outcome = run_aggregation(&records, &config, None, None).unwrap();
    assert!(outcome.store.buckets.keys().all(|k| k.extended.len() <= 1));
    // country, federation, year
    assert_eq!(outcome.report.extended_buckets, 3);

    let disabled = AggregatorConfig { max_extended_dimensions: 0, ..config };
    let outcome = run_aggregation(&records, &disabled, None, None).unwrap();
    assert_eq!(outcome.report.extended_buckets, 0);
}

// ── 5. Metadata ──

#[test]
fn metadata_counts_match_report() {
    let config = AggregatorConfig::default();
    let records = generate_synthetic_records(2_000, 3, &config);
    let outcome = run_aggregation(&records, &config, None, None).unwrap();
    let md = &outcome.store.metadata;

    assert_eq!(md.records.input, 2_000);
    assert_eq!(md.records.accepted, outcome.report.records_accepted);
    assert_eq!(md.buckets.base, outcome.report.base_buckets);
    assert_eq!(md.buckets.extended, outcome.report.extended_buckets);
    assert_eq!(md.buckets.base + md.buckets.extended, outcome.store.len());
    assert!(md.years.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(md.weight_classes["M"].last().map(String::as_str), Some("120+"));
    let by_sex: usize = md.by_sex.values().map(|s| s.count).sum();
    assert_eq!(by_sex, md.records.accepted);
}

// ── 6. Failure modes, cancellation, progress ──

#[test]
fn empty_or_all_invalid_input_fails() {
    let config = AggregatorConfig::default();
    assert!(matches!(run_aggregation(&[], &config, None, None), Err(AggregateError::EmptyInput)));

    let mut bad = lifter(100.0);
    bad.equipment.clear();
    assert!(matches!(
        run_aggregation(&[bad], &config, None, None),
        Err(AggregateError::NoValidRecords { discarded: 1 })
    ));
}

#[test]
fn cancel_from_progress_callback_stops_run() {
    let config = AggregatorConfig::default();
    let records = generate_synthetic_records(1_000, 9, &config);
    let cancel = AtomicBool::new(false);
    let on_progress = |_: &liftrank_runner::AggregateProgress| cancel.store(true, Ordering::Relaxed);

    let result = run_aggregation(&records, &config, Some(&on_progress), Some(&cancel));
    assert!(matches!(result, Err(AggregateError::Cancelled)));
}

#[test]
fn progress_reports_every_phase_and_finishes_complete() {
    let config = AggregatorConfig::default();
    let records = generate_synthetic_records(1_000, 4, &config);
    let seen = RefCell::new(Vec::new());
    let on_progress = |p: &liftrank_runner::AggregateProgress| seen.borrow_mut().push(p.clone());

    let outcome = run_aggregation(&records, &config, Some(&on_progress), None).unwrap();
    let seen = seen.into_inner();

    assert_eq!(seen.first().map(|p| p.phase), Some(AggregatePhase::Validating));
    let last = seen.last().unwrap();
    assert_eq!(last.phase, AggregatePhase::Finalizing);
    assert_eq!(last.groups_done, last.groups_total);
    assert_eq!(last.buckets_written, outcome.store.len());
    assert!(seen.iter().any(|p| p.phase == AggregatePhase::Computing));
}
