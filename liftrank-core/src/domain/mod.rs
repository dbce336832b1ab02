//! Domain types for liftrank

pub mod ids;
pub mod key;
pub mod record;

pub use ids::SnapshotVersion;
pub use key::{BaseKey, ExtendedDimension, ExtendedKey, FilterKey, KeyParseError};
pub use record::{Lift, ParseFieldError, Record, Sex, TestedStatus};
