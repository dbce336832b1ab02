//! Filter resolution: user selection → the bucket to rank against.
//!
//! A selection may leave age division and tested status as wildcards. The
//! resolver first builds the canonical key (age wildcard → "Open", tested
//! wildcard → "Untested"), then walks an ordered list of fallback rules and
//! returns the first key present in the store:
//!
//! 1. `exact`: the canonical key
//! 2. `open-age`: age was a wildcard → Open with the requested tested status
//! 3. `untested` / `tested`: tested was a wildcard → try each status in turn
//! 4. `open-untested`: Open + Untested, always last
//!
//! Rules are data, so alternate orders can be supplied. Extended selections are
//! held fixed by every rule.

use crate::classify::{ClassifyError, WeightClassTable, OPEN_DIVISION};
use crate::domain::{BaseKey, ExtendedDimension, ExtendedKey, FilterKey, Sex, TestedStatus};
use crate::stats::StatisticsBucket;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("no data for filters (canonical key {canonical})")]
    NoDataForFilters { canonical: FilterKey, attempted: Vec<FilterKey> },
}

/// A concrete value or the wildcard ("All").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection<T> {
    #[default]
    Any,
    Is(T),
}

impl<T> Selection<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Selection::Any)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Selection::Any => None,
            Selection::Is(v) => Some(v),
        }
    }
}

/// Text that means "no restriction".
pub fn is_wildcard(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t.eq_ignore_ascii_case("all") || t.eq_ignore_ascii_case("any")
}

impl Selection<String> {
    pub fn parse(raw: &str) -> Self {
        if is_wildcard(raw) {
            Selection::Any
        } else {
            Selection::Is(raw.trim().to_string())
        }
    }
}

impl Selection<TestedStatus> {
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        if is_wildcard(raw) {
            return Ok(Selection::Any);
        }
        raw.parse()
            .map(Selection::Is)
            .map_err(|e| ResolveError::InvalidInput(format!("{e}")))
    }
}

/// What a caller asks for. Sex and equipment are always concrete.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSelection {
    pub sex: Sex,
    pub equipment: String,
    pub weight_class: Selection<String>,
    pub age_division: Selection<String>,
    pub tested: Selection<TestedStatus>,
    /// Extended selections; unset dimensions are wildcards.
    pub extended: ExtendedKey,
}

impl FilterSelection {
    pub fn new(sex: Sex, equipment: impl Into<String>) -> Self {
        let equipment: String = equipment.into();
        Self {
            sex,
            equipment: equipment.trim().to_string(),
            weight_class: Selection::Any,
            age_division: Selection::Any,
            tested: Selection::Any,
            extended: ExtendedKey::default(),
        }
    }

    pub fn with_weight_class(mut self, label: &str) -> Self {
        self.weight_class = Selection::<String>::parse(label);
        self
    }

    pub fn with_age_division(mut self, division: &str) -> Self {
        self.age_division = Selection::<String>::parse(division);
        self
    }

    pub fn with_tested(mut self, tested: TestedStatus) -> Self {
        self.tested = Selection::Is(tested);
        self
    }

    /// Restrict an extended dimension; wildcard text clears it.
    pub fn with_extended(mut self, dimension: ExtendedDimension, value: &str) -> Result<Self, ResolveError> {
        if is_wildcard(value) {
            self.clear_extended(dimension);
            return Ok(self);
        }
        self.extended
            .set(dimension, value.trim())
            .map_err(|e| ResolveError::InvalidInput(e.to_string()))?;
        Ok(self)
    }

    pub fn clear_extended(&mut self, dimension: ExtendedDimension) {
        self.extended.clear(dimension);
    }
}

/// When a rule is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTrigger {
    Always,
    AgeWildcard,
    TestedWildcard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeChoice {
    Canonical,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestedChoice {
    Canonical,
    Fixed(TestedStatus),
}

/// One step of the fallback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackRule {
    pub name: &'static str,
    pub trigger: RuleTrigger,
    pub age: AgeChoice,
    pub tested: TestedChoice,
}

pub const DEFAULT_RULES: &[FallbackRule] = &[
    FallbackRule {
        name: "exact",
        trigger: RuleTrigger::Always,
        age: AgeChoice::Canonical,
        tested: TestedChoice::Canonical,
    },
    FallbackRule {
        name: "open-age",
        trigger: RuleTrigger::AgeWildcard,
        age: AgeChoice::Open,
        tested: TestedChoice::Canonical,
    },
    FallbackRule {
        name: "untested",
        trigger: RuleTrigger::TestedWildcard,
        age: AgeChoice::Canonical,
        tested: TestedChoice::Fixed(TestedStatus::Untested),
    },
    FallbackRule {
        name: "tested",
        trigger: RuleTrigger::TestedWildcard,
        age: AgeChoice::Canonical,
        tested: TestedChoice::Fixed(TestedStatus::Tested),
    },
    FallbackRule {
        name: "open-untested",
        trigger: RuleTrigger::Always,
        age: AgeChoice::Open,
        tested: TestedChoice::Fixed(TestedStatus::Untested),
    },
];

impl FallbackRule {
    pub fn applies(&self, selection: &FilterSelection) -> bool {
        match self.trigger {
            RuleTrigger::Always => true,
            RuleTrigger::AgeWildcard => selection.age_division.is_any(),
            RuleTrigger::TestedWildcard => selection.tested.is_any(),
        }
    }

    pub fn rewrite(&self, canonical: &FilterKey) -> FilterKey {
        let mut key = canonical.clone();
        if self.age == AgeChoice::Open {
            key.base.age_division = OPEN_DIVISION.to_string();
        }
        if let TestedChoice::Fixed(status) = self.tested {
            key.base.tested = status;
        }
        key
    }
}

/// Anything buckets can be looked up in.
pub trait BucketLookup {
    fn bucket(&self, key: &FilterKey) -> Option<&StatisticsBucket>;
}

impl BucketLookup for std::collections::BTreeMap<FilterKey, StatisticsBucket> {
    fn bucket(&self, key: &FilterKey) -> Option<&StatisticsBucket> {
        self.get(key)
    }
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution<'s> {
    pub key: FilterKey,
    pub rule: &'static str,
    pub bucket: &'s StatisticsBucket,
    /// Keys tried before the match, in order.
    pub attempted: Vec<FilterKey>,
}

pub struct Resolver<'a> {
    weight_classes: &'a WeightClassTable,
    rules: &'a [FallbackRule],
}

impl<'a> Resolver<'a> {
    pub fn new(weight_classes: &'a WeightClassTable) -> Self {
        Self { weight_classes, rules: DEFAULT_RULES }
    }

    pub fn with_rules(weight_classes: &'a WeightClassTable, rules: &'a [FallbackRule]) -> Self {
        Self { weight_classes, rules }
    }

    /// Weight class for a selection: the explicit label, else the class of
    /// `bodyweight_kg`, else `None`.
    pub fn weight_class(
        &self,
        selection: &FilterSelection,
        bodyweight_kg: Option<f64>,
    ) -> Result<Option<String>, ResolveError> {
        if let Selection::Is(label) = &selection.weight_class {
            return Ok(Some(label.clone()));
        }
        match bodyweight_kg {
            Some(bw) => Ok(Some(self.weight_classes.classify(selection.sex, bw)?)),
            None => Ok(None),
        }
    }

    /// Canonical key with wildcards defaulted.
    pub fn canonical_key(
        &self,
        selection: &FilterSelection,
        bodyweight_kg: Option<f64>,
    ) -> Result<FilterKey, ResolveError> {
        if selection.equipment.trim().is_empty() {
            return Err(ResolveError::InvalidInput("equipment is required".into()));
        }
        let weight_class = self.weight_class(selection, bodyweight_kg)?.ok_or_else(|| {
            ResolveError::InvalidInput("a weight class or bodyweight is required".into())
        })?;
        let age_division = selection
            .age_division
            .value()
            .cloned()
            .unwrap_or_else(|| OPEN_DIVISION.to_string());
        let tested = selection.tested.value().copied().unwrap_or(TestedStatus::Untested);
        Ok(FilterKey::new(
            BaseKey::new(selection.sex, selection.equipment.trim(), weight_class, age_division, tested),
            selection.extended.clone(),
        ))
    }

    /// Candidate keys in rule order, duplicates removed.
    pub fn candidates(&self, selection: &FilterSelection, canonical: &FilterKey) -> Vec<(&'static str, FilterKey)> {
        let mut out: Vec<(&'static str, FilterKey)> = Vec::with_capacity(self.rules.len());
        for rule in self.rules.iter().filter(|r| r.applies(selection)) {
            let key = rule.rewrite(canonical);
            if !out.iter().any(|(_, k)| *k == key) {
                out.push((rule.name, key));
            }
        }
        out
    }

    pub fn resolve<'s, L: BucketLookup + ?Sized>(
        &self,
        store: &'s L,
        selection: &FilterSelection,
        bodyweight_kg: Option<f64>,
    ) -> Result<Resolution<'s>, ResolveError> {
        let canonical = self.canonical_key(selection, bodyweight_kg)?;
        let mut attempted = Vec::new();
        for (rule, key) in self.candidates(selection, &canonical) {
            if let Some(bucket) = store.bucket(&key) {
                return Ok(Resolution { key, rule, bucket, attempted });
            }
            attempted.push(key);
        }
        Err(ResolveError::NoDataForFilters { canonical, attempted })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
