//! Query boundary over the live snapshot.
//!
//! Every query loads the current snapshot once and answers entirely from it,
//! so a publish in the middle of a query never mixes two snapshots.

use crate::handle::StoreHandle;
use liftrank_core::domain::{ExtendedDimension, FilterKey, SnapshotVersion};
use liftrank_core::rank::{rank_bucket, LiftPercentiles, LiftValues};
use liftrank_core::resolver::{FilterSelection, ResolveError, Resolver};
use liftrank_core::stats::StatisticsBucket;
use liftrank_core::store::{StatisticsStore, StoreMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("no statistics snapshot has been published")]
    StoreUnavailable,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no data for filters (canonical key {canonical}, {} keys tried)", .attempted.len())]
    NoDataForFilters { canonical: FilterKey, attempted: Vec<FilterKey> },
}

impl From<ResolveError> for QueryError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidInput(msg) => QueryError::InvalidInput(msg),
            ResolveError::Classify(err) => QueryError::InvalidInput(err.to_string()),
            ResolveError::NoDataForFilters { canonical, attempted } => {
                QueryError::NoDataForFilters { canonical, attempted }
            }
        }
    }
}

/// Ranks of the submitted lifts and where they were ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileResult {
    pub percentiles: LiftPercentiles,
    /// Bucket that answered, after fallback.
    pub key: FilterKey,
    /// Fallback rule that produced `key`.
    pub rule: String,
    pub sample_size: usize,
    pub snapshot_version: SnapshotVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResult {
    pub key: FilterKey,
    pub rule: String,
    pub bucket: StatisticsBucket,
    pub snapshot_version: SnapshotVersion,
}

#[derive(Debug, Clone)]
pub struct RankingService {
    handle: Arc<StoreHandle>,
}

impl RankingService {
    pub fn new(handle: Arc<StoreHandle>) -> Self {
        Self { handle }
    }

    /// Service over a fixed snapshot.
    pub fn from_store(store: StatisticsStore) -> Self {
        Self::new(Arc::new(StoreHandle::with_store(store)))
    }

    pub fn handle(&self) -> &Arc<StoreHandle> {
        &self.handle
    }

    pub fn snapshot(&self) -> Result<Arc<StatisticsStore>, QueryError> {
        self.handle.current().ok_or(QueryError::StoreUnavailable)
    }

    /// Rank lifts against the population selected by `filters`.
    ///
    /// `bodyweight_kg` picks the weight class when the selection leaves it as
    /// a wildcard. Each lift is ranked against its own table; a lift that was
    /// not submitted ranks `NOT_APPLICABLE`.
    pub fn resolve_percentiles(
        &self,
        filters: &FilterSelection,
        bodyweight_kg: Option<f64>,
        lifts: &LiftValues,
    ) -> Result<PercentileResult, QueryError> {
        let store = self.snapshot()?;
        let resolver = Resolver::new(&store.metadata.weight_class_table);
        let resolution = resolver.resolve(store.as_ref(), filters, bodyweight_kg).map_err(|e| {
            tracing::debug!(event = "query_no_data", error = %e, "percentile query unresolved");
            QueryError::from(e)
        })?;

        Ok(PercentileResult {
            percentiles: rank_bucket(resolution.bucket, lifts),
            sample_size: resolution.bucket.sample_size,
            rule: resolution.rule.to_string(),
            key: resolution.key,
            snapshot_version: store.version.clone(),
        })
    }

    /// Distribution (percentile tables, summaries, histograms) of a population.
    pub fn resolve_statistics(
        &self,
        filters: &FilterSelection,
        bodyweight_kg: Option<f64>,
    ) -> Result<StatisticsResult, QueryError> {
        let store = self.snapshot()?;
        let resolver = Resolver::new(&store.metadata.weight_class_table);
        let resolution = resolver.resolve(store.as_ref(), filters, bodyweight_kg)?;
        Ok(StatisticsResult {
            bucket: resolution.bucket.clone(),
            rule: resolution.rule.to_string(),
            key: resolution.key,
            snapshot_version: store.version.clone(),
        })
    }

    /// Selectable values of an extended dimension, `"All"` first.
    ///
    /// A wildcard weight class with no bodyweight spans every class.
    pub fn distinct_values(
        &self,
        dimension: ExtendedDimension,
        filters: &FilterSelection,
        bodyweight_kg: Option<f64>,
    ) -> Result<Vec<String>, QueryError> {
        let store = self.snapshot()?;
        let resolver = Resolver::new(&store.metadata.weight_class_table);
        let weight_class = resolver.weight_class(filters, bodyweight_kg)?;
        Ok(store.options.distinct_values(dimension, filters, weight_class.as_deref()))
    }

    pub fn metadata(&self) -> Result<StoreMetadata, QueryError> {
        Ok(self.snapshot()?.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_store_is_unavailable() {
        let service = RankingService::new(Arc::new(StoreHandle::new()));
        let filters = FilterSelection::new(liftrank_core::domain::Sex::M, "Raw");
        assert_eq!(service.metadata().unwrap_err(), QueryError::StoreUnavailable);
        assert_eq!(
            service.resolve_percentiles(&filters, Some(80.0), &LiftValues::default()).unwrap_err(),
            QueryError::StoreUnavailable
        );
        assert_eq!(
            service.distinct_values(ExtendedDimension::Country, &filters, None).unwrap_err(),
            QueryError::StoreUnavailable
        );
    }

    #[test]
    fn test_resolve_error_mapping() {
        let e: QueryError = ResolveError::InvalidInput("x".into()).into();
        assert_eq!(e, QueryError::InvalidInput("x".into()));
        let e: QueryError =
            ResolveError::Classify(liftrank_core::classify::ClassifyError::InvalidBodyweight(-1.0)).into();
        assert!(matches!(e, QueryError::InvalidInput(_)));
    }
}
