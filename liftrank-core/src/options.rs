//! Distinct-value index for cascading filter dropdowns.
//!
//! For every scope (sex, equipment, weight class, age division or any, tested
//! status or any) the index keeps the set of distinct extended tuples seen in
//! the records. A query for one dimension filters the tuples by the caller's
//! other extended selections and returns `"All"` followed by the remaining
//! distinct values. The queried dimension's own selection is ignored.

use crate::classify::OPEN_DIVISION;
use crate::domain::{ExtendedDimension, ExtendedKey, Record, Sex, TestedStatus};
use crate::resolver::FilterSelection;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// First entry of every option list.
pub const ALL_OPTION: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionScope {
    pub sex: Sex,
    pub equipment: String,
    pub weight_class: String,
    /// `None` covers every age division.
    pub age_division: Option<String>,
    /// `None` covers both statuses.
    pub tested: Option<TestedStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionIndex {
    #[serde(serialize_with = "entries_out", deserialize_with = "entries_in")]
    scopes: BTreeMap<OptionScope, BTreeSet<ExtendedKey>>,
}

fn entries_out<S: Serializer>(
    map: &BTreeMap<OptionScope, BTreeSet<ExtendedKey>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(map.iter())
}

fn entries_in<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<OptionScope, BTreeSet<ExtendedKey>>, D::Error> {
    let entries: Vec<(OptionScope, BTreeSet<ExtendedKey>)> = Vec::deserialize(deserializer)?;
    Ok(entries.into_iter().collect())
}

impl OptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one record under the wildcard variants of its scope. Every record
    /// also counts toward the Open division.
    pub fn insert(&mut self, record: &Record, weight_class: &str) {
        let tuple = ExtendedKey::of_record(record);
        let mut divisions = vec![Some(record.age_division.clone()), None];
        if record.age_division != OPEN_DIVISION {
            divisions.push(Some(OPEN_DIVISION.to_string()));
        }
        for age_division in divisions {
            for tested in [Some(record.tested), None] {
                let scope = OptionScope {
                    sex: record.sex,
                    equipment: record.equipment.clone(),
                    weight_class: weight_class.to_string(),
                    age_division: age_division.clone(),
                    tested,
                };
                self.scopes.entry(scope).or_default().insert(tuple.clone());
            }
        }
    }

    pub fn merge(&mut self, other: OptionIndex) {
        for (scope, tuples) in other.scopes {
            self.scopes.entry(scope).or_default().extend(tuples);
        }
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn tuple_count(&self) -> usize {
        self.scopes.values().map(BTreeSet::len).sum()
    }

    /// Iterate scopes and their tuples in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&OptionScope, &BTreeSet<ExtendedKey>)> {
        self.scopes.iter()
    }

    /// `"All"` plus the ascending distinct values of `dimension` compatible with
    /// the selection. `weight_class` of `None` spans every class.
    pub fn distinct_values(
        &self,
        dimension: ExtendedDimension,
        selection: &FilterSelection,
        weight_class: Option<&str>,
    ) -> Vec<String> {
        let mut filter = selection.extended.clone();
        filter.clear(dimension);
        let age = selection.age_division.value();
        let tested = selection.tested.value();

        let matching = self.scopes.iter().filter(|(scope, _)| {
            scope.sex == selection.sex
                && scope.equipment == selection.equipment.trim()
                && weight_class.map_or(true, |wc| scope.weight_class == wc)
                && scope.age_division.as_ref() == age
                && scope.tested.as_ref() == tested
        });

        let tuples = matching
            .flat_map(|(_, tuples)| tuples.iter())
            .filter(|t| filter.is_satisfied_by(t));

        let mut out = vec![ALL_OPTION.to_string()];
        if dimension == ExtendedDimension::Year {
            let years: BTreeSet<i32> = tuples.filter_map(|t| t.year).collect();
            out.extend(years.into_iter().map(|y| y.to_string()));
        } else {
            let values: BTreeSet<String> = tuples.filter_map(|t| t.get(dimension)).collect();
            out.extend(values);
        }
        out
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
