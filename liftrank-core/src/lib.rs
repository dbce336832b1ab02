//! LiftRank Core — domain types, classifiers, percentile statistics, ranking.
//!
//! This crate contains the pure, I/O-free part of the ranking engine:
//! - Domain types (records, sexes, lifts, filter keys)
//! - Weight-class and age-division classifiers
//! - Nearest-rank percentile tables, summaries, histograms
//! - Rank engine (value → interpolated percentile)
//! - Resolver with data-driven fallback rules
//! - Distinct-value option index for cascading filters
//! - Statistics store schema and content fingerprinting

pub mod classify;
pub mod domain;
pub mod fingerprint;
pub mod options;
pub mod rank;
pub mod resolver;
pub mod stats;
pub mod store;
