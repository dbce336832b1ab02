//! Snapshot persistence: `StatisticsStore` ⇄ JSON file.
//!
//! - Atomic writes (write to `.json.tmp`, rename into place)
//! - Load rejects unknown schema versions and content hashes that no longer
//!   match the buckets

use liftrank_core::store::{StatisticsStore, SCHEMA_VERSION};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode snapshot {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot schema {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("snapshot {path} content does not match its version {version}")]
    VersionMismatch { path: PathBuf, version: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a snapshot. Parent directories are created as needed.
pub fn write_snapshot(store: &StatisticsStore, path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let result = write_json(store, &tmp_path).and_then(|()| {
        // Atomic rename
        fs::rename(&tmp_path, path).map_err(io_err(path))
    });
    if result.is_err() {
        // Clean up temp file on failure
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    tracing::info!(
        event = "snapshot_written",
        path = %path.display(),
        version = store.version.short(),
        buckets = store.len(),
        "snapshot written"
    );
    Ok(())
}

fn write_json(store: &StatisticsStore, path: &Path) -> Result<(), SnapshotError> {
    let file = fs::File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, store).map_err(SnapshotError::Encode)?;
    writer.flush().map_err(io_err(path))?;
    Ok(())
}

/// Read and verify a snapshot.
pub fn read_snapshot(path: &Path) -> Result<StatisticsStore, SnapshotError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    let store: StatisticsStore =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SnapshotError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    if store.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            found: store.schema_version,
            expected: SCHEMA_VERSION,
        });
    }
    if !store.version_matches().map_err(SnapshotError::Encode)? {
        return Err(SnapshotError::VersionMismatch {
            path: path.to_path_buf(),
            version: store.version.to_string(),
        });
    }
    Ok(store)
}
