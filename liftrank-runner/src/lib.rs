//! LiftRank Runner — aggregation runs, snapshots, and the ranking service.
//!
//! This crate builds on `liftrank-core` to provide:
//! - Record loading from CSV and deterministic synthetic records
//! - Aggregation runs (parallel, cancellable, with progress)
//! - Store metadata (enumerations, per-slice summaries, run counts)
//! - Snapshot persistence with atomic writes and version checks
//! - Atomic snapshot publication and the `RankingService` query boundary

pub mod aggregator;
pub mod config;
pub mod data_loader;
pub mod handle;
pub mod metadata;
pub mod service;
pub mod snapshot;

pub use aggregator::{
    pool_open_division, run_aggregation, validate_record, AggregateError, AggregateOutcome, AggregatePhase,
    AggregateProgress, AggregateReport, DiscardReason,
};
pub use config::{AggregatorConfig, ConfigError};
pub use data_loader::{
    generate_synthetic_records, load_records_csv, read_records, write_records, write_records_csv, LoadError,
    LoadReport, LoadedRecords, SkippedRow,
};
pub use handle::StoreHandle;
pub use service::{PercentileResult, QueryError, RankingService, StatisticsResult};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotError};
