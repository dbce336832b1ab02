//! Filter keys: the identity of a statistics bucket.
//!
//! A `FilterKey` is a base key (sex, equipment, weight class, age division,
//! tested status; all always concrete) plus an optional set of extended
//! selections (country, state, federation, year, meet name). Keys have a
//! single canonical string form, used both as the snapshot map key and for
//! logging:
//!
//! ```text
//! M|Raw|83|Open|Untested
//! F|Single-ply|84+|Masters 1|Tested|country=USA|year=2023
//! ```
//!
//! Components escape `%`, `|` and `=` so arbitrary meet names round-trip.

use super::record::{Record, Sex, TestedStatus};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("filter key '{0}' has fewer than five base components")]
    TooShort(String),
    #[error("filter key component '{0}' is not a valid {1}")]
    BadComponent(String, &'static str),
    #[error("extended selection '{0}' is missing '='")]
    MissingAssignment(String),
    #[error("unknown extended dimension '{0}'")]
    UnknownDimension(String),
    #[error("extended dimension '{0}' appears twice")]
    DuplicateDimension(ExtendedDimension),
    #[error("bad escape sequence in '{0}'")]
    BadEscape(String),
}

/// Optional dimensions that narrow a base bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtendedDimension {
    Country,
    State,
    Federation,
    Year,
    MeetName,
}

impl ExtendedDimension {
    /// Canonical order, also the order components appear in key strings.
    pub const ALL: [ExtendedDimension; 5] = [
        ExtendedDimension::Country,
        ExtendedDimension::State,
        ExtendedDimension::Federation,
        ExtendedDimension::Year,
        ExtendedDimension::MeetName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtendedDimension::Country => "country",
            ExtendedDimension::State => "state",
            ExtendedDimension::Federation => "federation",
            ExtendedDimension::Year => "year",
            ExtendedDimension::MeetName => "meetName",
        }
    }
}

impl fmt::Display for ExtendedDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtendedDimension {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "country" => Ok(ExtendedDimension::Country),
            "state" => Ok(ExtendedDimension::State),
            "federation" => Ok(ExtendedDimension::Federation),
            "year" => Ok(ExtendedDimension::Year),
            "meetname" | "meet" => Ok(ExtendedDimension::MeetName),
            _ => Err(KeyParseError::UnknownDimension(s.to_string())),
        }
    }
}

/// Always-concrete part of a bucket key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaseKey {
    pub sex: Sex,
    pub equipment: String,
    pub weight_class: String,
    pub age_division: String,
    pub tested: TestedStatus,
}

impl BaseKey {
    pub fn new(
        sex: Sex,
        equipment: impl Into<String>,
        weight_class: impl Into<String>,
        age_division: impl Into<String>,
        tested: TestedStatus,
    ) -> Self {
        Self {
            sex,
            equipment: equipment.into(),
            weight_class: weight_class.into(),
            age_division: age_division.into(),
            tested,
        }
    }
}

/// Extended selections. `None` means the dimension is not part of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtendedKey {
    pub country: Option<String>,
    pub state: Option<String>,
    pub federation: Option<String>,
    pub year: Option<i32>,
    pub meet_name: Option<String>,
}

impl ExtendedKey {
    /// Value of one dimension in its text form.
    pub fn get(&self, dimension: ExtendedDimension) -> Option<String> {
        match dimension {
            ExtendedDimension::Country => self.country.clone(),
            ExtendedDimension::State => self.state.clone(),
            ExtendedDimension::Federation => self.federation.clone(),
            ExtendedDimension::Year => self.year.map(|y| y.to_string()),
            ExtendedDimension::MeetName => self.meet_name.clone(),
        }
    }

    pub fn has(&self, dimension: ExtendedDimension) -> bool {
        match dimension {
            ExtendedDimension::Country => self.country.is_some(),
            ExtendedDimension::State => self.state.is_some(),
            ExtendedDimension::Federation => self.federation.is_some(),
            ExtendedDimension::Year => self.year.is_some(),
            ExtendedDimension::MeetName => self.meet_name.is_some(),
        }
    }

    /// Set one dimension from text. Year values must parse as integers.
    pub fn set(&mut self, dimension: ExtendedDimension, value: &str) -> Result<(), KeyParseError> {
        let value = value.to_string();
        match dimension {
            ExtendedDimension::Country => self.country = Some(value),
            ExtendedDimension::State => self.state = Some(value),
            ExtendedDimension::Federation => self.federation = Some(value),
            ExtendedDimension::Year => {
                let year = value
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| KeyParseError::BadComponent(value.clone(), "year"))?;
                self.year = Some(year);
            }
            ExtendedDimension::MeetName => self.meet_name = Some(value),
        }
        Ok(())
    }

    pub fn clear(&mut self, dimension: ExtendedDimension) {
        match dimension {
            ExtendedDimension::Country => self.country = None,
            ExtendedDimension::State => self.state = None,
            ExtendedDimension::Federation => self.federation = None,
            ExtendedDimension::Year => self.year = None,
            ExtendedDimension::MeetName => self.meet_name = None,
        }
    }

    /// Dimensions present in this key, in canonical order.
    pub fn dimensions(&self) -> impl Iterator<Item = ExtendedDimension> + '_ {
        ExtendedDimension::ALL.into_iter().filter(move |d| self.has(*d))
    }

    pub fn len(&self) -> usize {
        self.dimensions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Project a record onto the given dimensions. `None` when the record
    /// lacks a value for any of them.
    pub fn project(record: &Record, dimensions: &[ExtendedDimension]) -> Option<Self> {
        let mut key = ExtendedKey::default();
        for dimension in dimensions {
            match dimension {
                ExtendedDimension::Country => key.country = Some(record.country.clone()?),
                ExtendedDimension::State => key.state = Some(record.state.clone()?),
                ExtendedDimension::Federation => key.federation = Some(record.federation.clone()?),
                ExtendedDimension::Year => key.year = Some(record.year?),
                ExtendedDimension::MeetName => key.meet_name = Some(record.meet_name.clone()?),
            }
        }
        Some(key)
    }

    /// Full extended tuple of a record (every dimension it has a value for).
    pub fn of_record(record: &Record) -> Self {
        Self {
            country: record.country.clone(),
            state: record.state.clone(),
            federation: record.federation.clone(),
            year: record.year,
            meet_name: record.meet_name.clone(),
        }
    }

    /// True when every dimension set on `self` has the same value in `other`.
    pub fn is_satisfied_by(&self, other: &ExtendedKey) -> bool {
        self.dimensions().all(|d| self.get(d) == other.get(d))
    }
}

/// Identity of one statistics bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterKey {
    pub base: BaseKey,
    pub extended: ExtendedKey,
}

impl FilterKey {
    pub fn base(base: BaseKey) -> Self {
        Self { base, extended: ExtendedKey::default() }
    }

    pub fn new(base: BaseKey, extended: ExtendedKey) -> Self {
        Self { base, extended }
    }

    pub fn is_extended(&self) -> bool {
        !self.extended.is_empty()
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(component: &str) -> Result<String, KeyParseError> {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let code: String = chars.by_ref().take(2).collect();
        match code.to_ascii_uppercase().as_str() {
            "25" => out.push('%'),
            "7C" => out.push('|'),
            "3D" => out.push('='),
            _ => return Err(KeyParseError::BadEscape(component.to_string())),
        }
    }
    Ok(out)
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.base;
        write!(
            f,
            "{}|{}|{}|{}|{}",
            b.sex,
            escape(&b.equipment),
            escape(&b.weight_class),
            escape(&b.age_division),
            b.tested
        )?;
        for dimension in self.extended.dimensions() {
            if let Some(value) = self.extended.get(dimension) {
                write!(f, "{SEPARATOR}{}={}", dimension, escape(&value))?;
            }
        }
        Ok(())
    }
}

impl FromStr for FilterKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() < 5 {
            return Err(KeyParseError::TooShort(s.to_string()));
        }
        let sex = parts[0]
            .parse::<Sex>()
            .map_err(|_| KeyParseError::BadComponent(parts[0].to_string(), "sex"))?;
        let tested = parts[4]
            .parse::<TestedStatus>()
            .map_err(|_| KeyParseError::BadComponent(parts[4].to_string(), "tested status"))?;
        let base = BaseKey {
            sex,
            equipment: unescape(parts[1])?,
            weight_class: unescape(parts[2])?,
            age_division: unescape(parts[3])?,
            tested,
        };

        let mut extended = ExtendedKey::default();
        for part in &parts[5..] {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| KeyParseError::MissingAssignment(part.to_string()))?;
            let dimension: ExtendedDimension = name.parse()?;
            if extended.has(dimension) {
                return Err(KeyParseError::DuplicateDimension(dimension));
            }
            extended.set(dimension, &unescape(value)?)?;
        }
        Ok(FilterKey { base, extended })
    }
}

impl Serialize for FilterKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilterKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
