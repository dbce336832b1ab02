//! Cleaned competition record and its categorical fields.
//!
//! A `Record` is one lifter's result at one meet, after upstream cleaning:
//! - `sex`, `equipment` and `tested` are always present
//! - extended fields (country, state, federation, year, meet name) are optional
//! - lift values are kilograms; a missing lift is stored as `0.0`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a categorical text field cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} value '{value}'")]
pub struct ParseFieldError {
    pub field: &'static str,
    pub value: String,
}

impl ParseFieldError {
    fn new(field: &'static str, value: &str) -> Self {
        Self { field, value: value.to_string() }
    }
}

/// Competitor sex as recorded by the federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::M, Sex::F];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::M => "M",
            Sex::F => "F",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Sex::M),
            "f" | "female" => Ok(Sex::F),
            _ => Err(ParseFieldError::new("sex", s)),
        }
    }
}

/// Drug-tested status of the meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestedStatus {
    Tested,
    Untested,
}

impl TestedStatus {
    pub const ALL: [TestedStatus; 2] = [TestedStatus::Tested, TestedStatus::Untested];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestedStatus::Tested => "Tested",
            TestedStatus::Untested => "Untested",
        }
    }

    /// Map the raw source flag. Federations publish "Yes" for tested meets and
    /// leave the column empty otherwise.
    pub fn from_flag(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "yes" || s == "tested" || s == "true" => TestedStatus::Tested,
            _ => TestedStatus::Untested,
        }
    }
}

impl fmt::Display for TestedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestedStatus {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tested" | "yes" => Ok(TestedStatus::Tested),
            "untested" | "no" => Ok(TestedStatus::Untested),
            _ => Err(ParseFieldError::new("tested", s)),
        }
    }
}

/// The four ranked lifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lift {
    Squat,
    Bench,
    Deadlift,
    Total,
}

impl Lift {
    pub const ALL: [Lift; 4] = [Lift::Squat, Lift::Bench, Lift::Deadlift, Lift::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lift::Squat => "squat",
            Lift::Bench => "bench",
            Lift::Deadlift => "deadlift",
            Lift::Total => "total",
        }
    }
}

impl fmt::Display for Lift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lift {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squat" => Ok(Lift::Squat),
            "bench" => Ok(Lift::Bench),
            "deadlift" => Ok(Lift::Deadlift),
            "total" => Ok(Lift::Total),
            _ => Err(ParseFieldError::new("lift", s)),
        }
    }
}

/// One cleaned competition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub sex: Sex,
    pub equipment: String,
    pub bodyweight_kg: f64,
    pub age_division: String,
    pub tested: TestedStatus,
    pub country: Option<String>,
    pub state: Option<String>,
    pub federation: Option<String>,
    pub year: Option<i32>,
    pub meet_name: Option<String>,
    pub squat_kg: f64,
    pub bench_kg: f64,
    pub deadlift_kg: f64,
    pub total_kg: f64,
}

impl Record {
    pub fn lift(&self, lift: Lift) -> f64 {
        match lift {
            Lift::Squat => self.squat_kg,
            Lift::Bench => self.bench_kg,
            Lift::Deadlift => self.deadlift_kg,
            Lift::Total => self.total_kg,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
