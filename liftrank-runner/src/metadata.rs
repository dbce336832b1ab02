//! Store metadata: global enumerations, per-slice summaries and run counts.

use crate::aggregator::DiscardReason;
use crate::config::AggregatorConfig;
use liftrank_core::classify::OPEN_DIVISION;
use liftrank_core::domain::{BaseKey, Record, Sex, TestedStatus};
use liftrank_core::fingerprint::record_set_hash;
use liftrank_core::store::{BucketCounts, GroupSummary, RecordCounts, StoreMetadata, YearRange};
use std::collections::{BTreeMap, BTreeSet};

/// Running sums for a `GroupSummary`; lifts only count when positive.
#[derive(Default)]
struct SummaryAcc {
    count: usize,
    sums: [f64; 4],
    counts: [usize; 4],
}

impl SummaryAcc {
    fn add(&mut self, record: &Record) {
        self.count += 1;
        let lifts = [record.squat_kg, record.bench_kg, record.deadlift_kg, record.total_kg];
        for (i, v) in lifts.into_iter().enumerate() {
            if v > 0.0 {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn finish(&self) -> GroupSummary {
        let mean = |i: usize| {
            if self.counts[i] == 0 {
                0.0
            } else {
                self.sums[i] / self.counts[i] as f64
            }
        };
        GroupSummary {
            count: self.count,
            mean_squat: mean(0),
            mean_bench: mean(1),
            mean_deadlift: mean(2),
            mean_total: mean(3),
        }
    }
}

fn finish_all(accs: BTreeMap<String, SummaryAcc>) -> BTreeMap<String, GroupSummary> {
    accs.into_iter().map(|(k, acc)| (k, acc.finish())).collect()
}

/// Build metadata from the input and the accepted records grouped by base key.
pub fn build_metadata(
    input: &[Record],
    groups: &[(BaseKey, Vec<&Record>)],
    discarded: &BTreeMap<DiscardReason, usize>,
    buckets: BucketCounts,
    config: &AggregatorConfig,
) -> Result<StoreMetadata, serde_json::Error> {
    let mut equipment = BTreeSet::new();
    let mut divisions = BTreeSet::new();
    let mut tested = BTreeSet::new();
    let mut classes: BTreeMap<Sex, BTreeSet<String>> = BTreeMap::new();
    let mut countries = BTreeSet::new();
    let mut federations = BTreeSet::new();
    let mut years = BTreeSet::new();
    let mut states_by_country: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut by_sex: BTreeMap<String, SummaryAcc> = BTreeMap::new();
    let mut by_equipment: BTreeMap<String, SummaryAcc> = BTreeMap::new();
    let mut by_age_division: BTreeMap<String, SummaryAcc> = BTreeMap::new();
    let mut accepted = 0usize;

    for (key, members) in groups {
        equipment.insert(key.equipment.clone());
        divisions.insert(key.age_division.clone());
        tested.insert(key.tested);
        classes.entry(key.sex).or_default().insert(key.weight_class.clone());

        for record in members {
            accepted += 1;
            if let Some(c) = &record.country {
                countries.insert(c.clone());
                if let Some(s) = &record.state {
                    states_by_country.entry(c.clone()).or_default().insert(s.clone());
                }
            }
            if let Some(f) = &record.federation {
                federations.insert(f.clone());
            }
            if let Some(y) = record.year {
                years.insert(y);
            }
            by_sex.entry(record.sex.to_string()).or_default().add(record);
            by_equipment.entry(record.equipment.clone()).or_default().add(record);
            by_age_division.entry(record.age_division.clone()).or_default().add(record);
        }
    }

    // Open buckets pool every division, so Open is always queryable.
    if accepted > 0 {
        divisions.insert(OPEN_DIVISION.to_string());
    }

    // Configured divisions in table order, then any others alphabetically.
    let configured = config.age_divisions.names();
    let mut age_divisions: Vec<String> = divisions.into_iter().collect();
    age_divisions.sort_by_key(|d| configured.iter().position(|c| c == d).unwrap_or(usize::MAX));

    let weight_classes = classes
        .into_iter()
        .map(|(sex, labels)| {
            let mut labels: Vec<String> = labels.into_iter().collect();
            labels.sort_by_key(|l| config.weight_classes.label_rank(sex, l));
            (sex.to_string(), labels)
        })
        .collect();

    let year_range = match (years.first(), years.last()) {
        (Some(&min), Some(&max)) => Some(YearRange { min, max }),
        _ => None,
    };

    Ok(StoreMetadata {
        equipment_types: equipment.into_iter().collect(),
        age_divisions,
        tested_statuses: tested.into_iter().collect::<Vec<TestedStatus>>(),
        weight_classes,
        countries: countries.into_iter().collect(),
        federations: federations.into_iter().collect(),
        years: years.into_iter().rev().collect(),
        states_by_country: states_by_country
            .into_iter()
            .map(|(c, s)| (c, s.into_iter().collect()))
            .collect(),
        year_range,
        records: RecordCounts {
            input: input.len(),
            accepted,
            discarded: discarded.iter().map(|(r, n)| (r.as_str().to_string(), *n)).collect(),
        },
        buckets,
        by_sex: finish_all(by_sex),
        by_equipment: finish_all(by_equipment),
        by_age_division: finish_all(by_age_division),
        weight_class_table: config.weight_classes.clone(),
        min_extended_sample: config.min_extended_sample,
        input_hash: record_set_hash(input)?,
    })
}
