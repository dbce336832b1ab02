//! End-to-end: records → aggregation → snapshot file → publish → queries.

use liftrank_core::domain::{ExtendedDimension, Record, Sex, TestedStatus};
use liftrank_core::rank::{LiftValues, NOT_APPLICABLE};
use liftrank_core::resolver::FilterSelection;
use liftrank_runner::{
    read_records, read_snapshot, run_aggregation, write_snapshot, AggregatorConfig, QueryError, RankingService, StoreHandle,
};
use std::sync::Arc;

fn lifter(squat: f64, country: Option<&str>) -> Record {
    Record {
        sex: Sex::M,
        equipment: "Raw".into(),
        bodyweight_kg: 80.0,
        age_division: "Open".into(),
        tested: TestedStatus::Untested,
        country: country.map(str::to_string),
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

/// 1000 lifters squatting 1..=1000 kg; the first 12 from the USA, one from Norway.
fn population() -> Vec<Record> {
    (1..=1000)
        .map(|i| {
            let country = match i {
                1..=12 => Some("USA"),
                13 => Some("Norway"),
                _ => None,
            };
            lifter(i as f64, country)
        })
        .collect()
}

fn service() -> RankingService {
    let outcome = run_aggregation(&population(), &AggregatorConfig::default(), None, None).unwrap();
    RankingService::from_store(outcome.store)
}

fn raw_men() -> FilterSelection {
    FilterSelection::new(Sex::M, "Raw")
}

#[test]
fn squat_at_true_90th_percentile_ranks_90() {
    let svc = service();
    let lifts = LiftValues { squat: Some(900.0), ..Default::default() };
    let result = svc.resolve_percentiles(&raw_men(), Some(80.0), &lifts).unwrap();

    assert_eq!(result.percentiles.squat, 90.0);
    assert_eq!(result.percentiles.bench, NOT_APPLICABLE);
    assert_eq!(result.percentiles.total, NOT_APPLICABLE);
    assert_eq!(result.sample_size, 1000);
    assert_eq!(result.rule, "exact");
    assert_eq!(result.key.to_string(), "M|Raw|83|Open|Untested");
}

#[test]
fn explicit_filters_without_data_fall_back_to_open_untested() {
    let svc = service();
    let filters = raw_men().with_age_division("Junior").with_tested(TestedStatus::Tested);
    let lifts = LiftValues { squat: Some(1000.0), ..Default::default() };
    let result = svc.resolve_percentiles(&filters, Some(80.0), &lifts).unwrap();

    assert_eq!(result.rule, "open-untested");
    assert_eq!(result.key.base.age_division, "Open");
    assert_eq!(result.percentiles.squat, 99.0);
}

#[test]
fn age_wildcard_covers_lifters_of_every_derived_division() {
    let mut csv = String::from("Sex,Equipment,Age,BodyweightKg,Best3SquatKg,Best3BenchKg,Best3DeadliftKg,TotalKg\n");
    for age in [21, 30, 45] {
        for i in 0..50 {
            let squat = 150 + i;
            csv.push_str(&format!("M,Raw,{age},80,{squat},100,200,{}\n", squat + 300));
        }
    }
    let config = AggregatorConfig::default();
    let loaded = read_records(csv.as_bytes(), &config.age_divisions).unwrap();
    assert_eq!(loaded.records.len(), 150);

    let outcome = run_aggregation(&loaded.records, &config, None, None).unwrap();
    let svc = RankingService::from_store(outcome.store);

    let everyone = svc.resolve_statistics(&raw_men(), Some(80.0)).unwrap();
    assert_eq!(everyone.rule, "exact");
    assert_eq!(everyone.key.to_string(), "M|Raw|83|Open|Untested");
    assert_eq!(everyone.bucket.sample_size, 150);

    let juniors = svc.resolve_statistics(&raw_men().with_age_division("Junior"), Some(80.0)).unwrap();
    assert_eq!(juniors.key.base.age_division, "Junior");
    assert_eq!(juniors.bucket.sample_size, 50);
}

#[test]
fn unknown_population_reports_no_data() {
    let svc = service();
    let err = svc
        .resolve_statistics(&FilterSelection::new(Sex::F, "Raw"), Some(60.0))
        .unwrap_err();
    match err {
        QueryError::NoDataForFilters { canonical, attempted } => {
            assert_eq!(canonical.to_string(), "F|Raw|63|Open|Untested");
            assert!(!attempted.is_empty());
        }
        other => panic!("expected NoDataForFilters, got {other:?}"),
    }
}

#[test]
fn missing_weight_class_and_bodyweight_is_invalid_input() {
    let svc = service();
    let err = svc.resolve_statistics(&raw_men(), None).unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}

#[test]
fn extended_groups_below_minimum_are_not_queryable() {
    let svc = service();

    let usa = raw_men().with_extended(ExtendedDimension::Country, "USA").unwrap();
    let stats = svc.resolve_statistics(&usa, Some(80.0)).unwrap();
    assert_eq!(stats.bucket.sample_size, 12);
    assert!(stats.key.is_extended());

    let norway = raw_men().with_extended(ExtendedDimension::Country, "Norway").unwrap();
    let err = svc.resolve_statistics(&norway, Some(80.0)).unwrap_err();
    match err {
        // extended selection is never dropped by fallback
        QueryError::NoDataForFilters { attempted, .. } => assert!(attempted.iter().all(|k| k.is_extended())),
        other => panic!("expected NoDataForFilters, got {other:?}"),
    }
}

#[test]
fn distinct_values_follow_other_selections() {
    let svc = service();
    let countries = svc.distinct_values(ExtendedDimension::Country, &raw_men(), Some(80.0)).unwrap();
    assert_eq!(countries, vec!["All", "Norway", "USA"]);

    let years = svc.distinct_values(ExtendedDimension::Year, &raw_men(), None).unwrap();
    assert_eq!(years, vec!["All", "2023"]);

    let women = svc
        .distinct_values(ExtendedDimension::Country, &FilterSelection::new(Sex::F, "Raw"), None)
        .unwrap();
    assert_eq!(women, vec!["All"]);
}

#[test]
fn snapshot_round_trip_preserves_answers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots/stats.json");
    let outcome = run_aggregation(&population(), &AggregatorConfig::default(), None, None).unwrap();

    write_snapshot(&outcome.store, &path).unwrap();
    let loaded = read_snapshot(&path).unwrap();
    assert_eq!(loaded, outcome.store);

    let svc = RankingService::from_store(loaded);
    let lifts = LiftValues { squat: Some(900.0), total: Some(1200.0), ..Default::default() };
    let result = svc.resolve_percentiles(&raw_men(), Some(80.0), &lifts).unwrap();
    assert_eq!(result.percentiles.squat, 90.0);
    assert_eq!(result.percentiles.total, 90.0);
    assert_eq!(result.snapshot_version, outcome.store.version);
}

#[test]
fn publish_swaps_the_snapshot_seen_by_queries() {
    let handle = Arc::new(StoreHandle::new());
    let svc = RankingService::new(Arc::clone(&handle));
    assert_eq!(svc.metadata().unwrap_err(), QueryError::StoreUnavailable);

    let first = run_aggregation(&population(), &AggregatorConfig::default(), None, None).unwrap();
    let first_version = first.store.version.clone();
    handle.publish(first.store);
    assert_eq!(svc.snapshot().unwrap().version, first_version);

    let smaller: Vec<Record> = population().into_iter().take(500).collect();
    let second = run_aggregation(&smaller, &AggregatorConfig::default(), None, None).unwrap();
    let previous = handle.publish(second.store).unwrap();
    assert_eq!(previous.version, first_version);

    let stats = svc.resolve_statistics(&raw_men(), Some(80.0)).unwrap();
    assert_eq!(stats.bucket.sample_size, 500);
    assert_ne!(stats.snapshot_version, first_version);
    assert_eq!(svc.metadata().unwrap().records.input, 500);
}
