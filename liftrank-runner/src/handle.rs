//! Live snapshot slot.
//!
//! One `StoreHandle` is shared by every query. Aggregation builds a complete
//! store off to the side and `publish` swaps it in atomically; readers clone the
//! current `Arc` without locking and keep a consistent view for the whole
//! query, even if a newer snapshot is published meanwhile.

use arc_swap::ArcSwapOption;
use liftrank_core::store::StatisticsStore;
use std::sync::Arc;

#[derive(Default)]
pub struct StoreHandle {
    slot: ArcSwapOption<StatisticsStore>,
}

impl StoreHandle {
    /// An empty handle; queries fail with `StoreUnavailable` until the first publish.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: StatisticsStore) -> Self {
        let handle = Self::new();
        handle.publish(store);
        handle
    }

    /// Replace the live snapshot, returning the previous one.
    pub fn publish(&self, store: StatisticsStore) -> Option<Arc<StatisticsStore>> {
        let version = store.version.short().to_string();
        let buckets = store.len();
        let previous = self.slot.swap(Some(Arc::new(store)));
        tracing::info!(
            event = "snapshot_published",
            version = %version,
            buckets,
            replaced = ?previous.as_ref().map(|p| p.version.short().to_string()),
            "snapshot published"
        );
        previous
    }

    /// The live snapshot, if any.
    pub fn current(&self) -> Option<Arc<StatisticsStore>> {
        self.slot.load_full()
    }

    pub fn is_published(&self) -> bool {
        self.slot.load().is_some()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.slot.load();
        f.debug_struct("StoreHandle")
            .field("version", &current.as_ref().map(|s| s.version.to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftrank_core::options::OptionIndex;
    use liftrank_core::store::StoreMetadata;
    use std::collections::BTreeMap;

    fn store(equipment: &str) -> StatisticsStore {
        let metadata = StoreMetadata {
            equipment_types: vec![equipment.to_string()],
            ..Default::default()
        };
        StatisticsStore::new(chrono::Utc::now(), metadata, BTreeMap::new(), OptionIndex::new()).unwrap()
    }

    #[test]
    fn test_empty_handle_has_no_store() {
        let handle = StoreHandle::new();
        assert!(handle.current().is_none());
        assert!(!handle.is_published());
    }

    #[test]
    fn test_publish_swaps_and_returns_previous() {
        let handle = StoreHandle::with_store(store("Raw"));
        let held = handle.current().unwrap();

        let previous = handle.publish(store("Wraps")).unwrap();
        assert_eq!(previous.metadata.equipment_types, vec!["Raw"]);
        assert_eq!(handle.current().unwrap().metadata.equipment_types, vec!["Wraps"]);
        // A reader that loaded before the swap keeps its snapshot.
        assert_eq!(held.metadata.equipment_types, vec!["Raw"]);
    }
}
