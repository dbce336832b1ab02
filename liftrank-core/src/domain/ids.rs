use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a statistics snapshot (BLAKE3 hex).
///
/// Computed over the queryable content only, so re-aggregating identical
/// input yields the same version regardless of when it ran.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(pub String);

impl SnapshotVersion {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }

    pub fn from_hasher(hasher: &blake3::Hasher) -> Self {
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
