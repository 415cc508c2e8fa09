//! Durable bookkeeping for the merge pipeline.
//!
//! Three human-readable JSON files carry all cross-run state:
//!
//! * [`cache`]: per-source hash cache (`.audiomerge_cache.json` in each
//!   source root), so unchanged files are never re-hashed.
//! * [`index`]: the set of fingerprints already present in a target library
//!   (`.audiomerge_index.json` in the target root).
//! * [`path_map`]: target path → fingerprint map
//!   (`.audiomerge_paths.json`), enabling cheap index maintenance when a
//!   target file is later removed.
//!
//! All writes go through [`save_json`]: serialize into a temp file in the
//! same directory, then rename over the destination. A crash mid-write
//! leaves the previous file intact, never a truncated one.
//!
//! Paths are stored as JSON strings, so only UTF-8 paths can be tracked;
//! discovery rejects non-UTF-8 candidates before they reach a store.

pub mod cache;
pub mod index;
pub mod path_map;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

pub use cache::{CacheEntry, SourceCache, CACHE_FILE_NAME};
pub use index::{TargetIndex, INDEX_FILE_NAME};
pub use path_map::{PathMap, PATH_MAP_FILE_NAME};

/// Errors from loading or saving a persisted store file.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid JSON of the expected shape.
    ///
    /// Deliberately distinct from `Read`: a corrupt store is only ever
    /// recovered by an explicit reset, never silently.
    #[error("{path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file could not be written or atomically replaced.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load a JSON store file, treating a missing file as the default value.
pub(crate) fn load_json<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let text = fs::read_to_string(path).map_err(|e| StoreError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Atomically replace a JSON store file.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;

    serde_json::to_writer_pretty(&mut tmp, value)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
