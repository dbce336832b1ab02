//! Age → age-division label.
//!
//! Specific divisions are checked first, in table order; an age that matches
//! none of them (or a missing age) falls back to the default division.

use serde::{Deserialize, Serialize};

/// Division every lifter is eligible for.
pub const OPEN_DIVISION: &str = "Open";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeDivision {
    pub name: String,
    /// Inclusive lower bound.
    pub min_age: f64,
    /// Inclusive upper bound.
    pub max_age: f64,
}

impl AgeDivision {
    pub fn new(name: &str, min_age: f64, max_age: f64) -> Self {
        Self { name: name.to_string(), min_age, max_age }
    }

    pub fn contains(&self, age: f64) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeDivisionTable {
    pub divisions: Vec<AgeDivision>,
    pub default_division: String,
}

impl Default for AgeDivisionTable {
    fn default() -> Self {
        Self {
            divisions: vec![
                AgeDivision::new("Sub-Junior", 13.0, 18.0),
                AgeDivision::new("Junior", 19.0, 23.0),
                AgeDivision::new("Masters 1", 40.0, 49.0),
                AgeDivision::new("Masters 2", 50.0, 59.0),
                AgeDivision::new("Masters 3", 60.0, 69.0),
                AgeDivision::new("Masters 4", 70.0, 999.0),
            ],
            default_division: OPEN_DIVISION.to_string(),
        }
    }
}

impl AgeDivisionTable {
    pub fn classify(&self, age: Option<f64>) -> &str {
        age.filter(|a| a.is_finite())
            .and_then(|a| self.divisions.iter().find(|d| d.contains(a)))
            .map(|d| d.name.as_str())
            .unwrap_or(self.default_division.as_str())
    }

    /// Division names in table order, default last.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.divisions.iter().map(|d| d.name.clone()).collect();
        if !names.contains(&self.default_division) {
            names.push(self.default_division.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_divisions_win_over_open() {
        let table = AgeDivisionTable::default();
        assert_eq!(table.classify(Some(17.0)), "Sub-Junior");
        assert_eq!(table.classify(Some(23.0)), "Junior");
        assert_eq!(table.classify(Some(45.5)), "Masters 1");
        assert_eq!(table.classify(Some(82.0)), "Masters 4");
    }

    #[test]
    fn gaps_and_missing_ages_fall_back_to_open() {
        let table = AgeDivisionTable::default();
        assert_eq!(table.classify(Some(30.0)), OPEN_DIVISION);
        assert_eq!(table.classify(Some(23.5)), OPEN_DIVISION);
        assert_eq!(table.classify(None), OPEN_DIVISION);
        assert_eq!(table.classify(Some(f64::NAN)), OPEN_DIVISION);
    }

    #[test]
    fn names_end_with_default() {
        let names = AgeDivisionTable::default().names();
        assert_eq!(names.first().map(String::as_str), Some("Sub-Junior"));
        assert_eq!(names.last().map(String::as_str), Some(OPEN_DIVISION));
    }
}
