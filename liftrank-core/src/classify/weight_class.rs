//! Bodyweight → weight-class label.
//!
//! Thresholds are upper bounds in kilograms, ascending, per sex. The final
//! entry is a sentinel: anything above the second-to-last threshold falls into
//! the "plus" class labelled `"{second_last}+"`.
//!
//! Bodyweight is rounded down to one decimal before comparison, so 83.04 kg is
//! classified as 83.0 kg (class "83") and 83.96 kg as 83.9 kg (class "93").

use super::ClassifyError;
use crate::domain::Sex;
use serde::{Deserialize, Serialize};

/// IPF-style class limits, men.
pub const DEFAULT_MALE_CLASSES: [f64; 8] = [59.0, 66.0, 74.0, 83.0, 93.0, 105.0, 120.0, 999.0];
/// IPF-style class limits, women.
pub const DEFAULT_FEMALE_CLASSES: [f64; 7] = [47.0, 52.0, 57.0, 63.0, 72.0, 84.0, 999.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightClassTable {
    pub male: Vec<f64>,
    pub female: Vec<f64>,
}

impl Default for WeightClassTable {
    fn default() -> Self {
        Self {
            male: DEFAULT_MALE_CLASSES.to_vec(),
            female: DEFAULT_FEMALE_CLASSES.to_vec(),
        }
    }
}

/// Round down to the nearest 0.1 kg.
///
/// The nudge is a few ulps relative to the value, enough to keep exact tenths
/// such as 70.1 in place without lifting 83.0999… to 83.1.
pub fn round_down_tenth(kg: f64) -> f64 {
    (kg * 10.0 * (1.0 + 4.0 * f64::EPSILON)).floor() / 10.0
}

/// Render a threshold as a label: whole numbers drop the decimal.
pub fn threshold_label(threshold: f64) -> String {
    format!("{threshold}")
}

impl WeightClassTable {
    pub fn thresholds(&self, sex: Sex) -> &[f64] {
        match sex {
            Sex::M => &self.male,
            Sex::F => &self.female,
        }
    }

    /// Check that both tables are strictly ascending, finite and have at least
    /// one real class plus the sentinel.
    pub fn validate(&self) -> Result<(), ClassifyError> {
        for sex in Sex::ALL {
            let table = self.thresholds(sex);
            if table.len() < 2 {
                return Err(ClassifyError::InvalidTable {
                    sex,
                    reason: "needs at least one class and a sentinel".into(),
                });
            }
            if table.iter().any(|t| !t.is_finite() || *t <= 0.0) {
                return Err(ClassifyError::InvalidTable {
                    sex,
                    reason: "thresholds must be positive and finite".into(),
                });
            }
            if table.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ClassifyError::InvalidTable {
                    sex,
                    reason: "thresholds must be strictly ascending".into(),
                });
            }
        }
        Ok(())
    }

    /// Classify a bodyweight into a class label.
    pub fn classify(&self, sex: Sex, bodyweight_kg: f64) -> Result<String, ClassifyError> {
        if !bodyweight_kg.is_finite() || bodyweight_kg <= 0.0 {
            return Err(ClassifyError::InvalidBodyweight(bodyweight_kg));
        }
        let table = self.thresholds(sex);
        if table.len() < 2 {
            return Err(ClassifyError::InvalidTable {
                sex,
                reason: "needs at least one class and a sentinel".into(),
            });
        }
        let rounded = round_down_tenth(bodyweight_kg);
        let sentinel = table.len() - 1;
        match table[..sentinel].iter().find(|&&t| rounded <= t) {
            Some(&t) => Ok(threshold_label(t)),
            None => Ok(self.plus_label(sex)),
        }
    }

    fn plus_label(&self, sex: Sex) -> String {
        let table = self.thresholds(sex);
        let last_real = table.len().saturating_sub(2);
        format!("{}+", threshold_label(table.get(last_real).copied().unwrap_or_default()))
    }

    /// All labels for a sex, lightest first, plus class last.
    pub fn labels(&self, sex: Sex) -> Vec<String> {
        let table = self.thresholds(sex);
        if table.len() < 2 {
            return Vec::new();
        }
        let mut labels: Vec<String> = table[..table.len() - 1].iter().map(|&t| threshold_label(t)).collect();
        labels.push(self.plus_label(sex));
        labels
    }

    /// Sort position of a label within its sex's classes; unknown labels sort last.
    pub fn label_rank(&self, sex: Sex, label: &str) -> usize {
        self.labels(sex).iter().position(|l| l == label).unwrap_or(usize::MAX)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
