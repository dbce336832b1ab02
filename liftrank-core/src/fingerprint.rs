//! Deterministic content hashes.
//!
//! - `snapshot_version`: identity of a snapshot's queryable content (buckets
//!   and option index). The generation timestamp is not part of it.
//! - `record_set_hash`: identity of an input record set, in input order.
//!
//! Both hash canonical JSON with BLAKE3. Bucket and option maps are
//! `BTreeMap`s, so serialization order is fixed.

use crate::domain::{FilterKey, Record, SnapshotVersion};
use crate::options::OptionIndex;
use crate::stats::StatisticsBucket;
use std::collections::BTreeMap;

pub fn snapshot_version(
    buckets: &BTreeMap<FilterKey, StatisticsBucket>,
    options: &OptionIndex,
) -> Result<SnapshotVersion, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, buckets)?;
    hasher.update(b"\n");
    serde_json::to_writer(&mut hasher, options)?;
    Ok(SnapshotVersion::from_hasher(&hasher))
}

pub fn record_set_hash(records: &[Record]) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(records.len() as u64).to_le_bytes());
    for record in records {
        serde_json::to_writer(&mut hasher, record)?;
        hasher.update(b"\n");
    }
    Ok(hasher.finalize().to_hex().to_string())
}
