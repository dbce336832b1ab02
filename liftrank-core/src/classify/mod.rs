//! Classifiers that turn raw lifter attributes into bucket dimensions.

pub mod age_division;
pub mod weight_class;

pub use age_division::{AgeDivision, AgeDivisionTable, OPEN_DIVISION};
pub use weight_class::{round_down_tenth, WeightClassTable};

use crate::domain::Sex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("bodyweight must be a positive number, got {0}")]
    InvalidBodyweight(f64),
    #[error("weight class table for {sex} is invalid: {reason}")]
    InvalidTable { sex: Sex, reason: String },
}
