//! Pruning the target index after manual deletions.
//!
//! When files are removed from the target library by hand, their
//! fingerprints linger in the index and would wrongly classify future
//! sources as duplicates. Pruning walks the path map, drops every entry
//! whose file no longer exists, and removes the matching fingerprints from
//! the index. The path map makes this O(deleted files) with no re-hashing.

use std::path::{Path, PathBuf};

use crate::store::{PathMap, StoreError, TargetIndex};

/// Counters from one prune run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Path map entries examined
    pub examined: usize,
    /// Entries whose file was gone and whose fingerprint was dropped
    pub removed: usize,
}

/// Remove index and map entries for target files that no longer exist.
///
/// Both stores are rewritten atomically afterwards, even when nothing was
/// removed (a no-op rewrite keeps them in sync on disk).
///
/// # Errors
///
/// Returns a [`StoreError`] when the index or map cannot be loaded or
/// saved. A corrupt store is never pruned.
pub fn prune(target_root: &Path) -> Result<PruneReport, StoreError> {
    let mut index = TargetIndex::load(target_root)?;
    let mut path_map = PathMap::load(target_root)?;

    let mut report = PruneReport::default();
    let mut stale: Vec<PathBuf> = Vec::new();
    for (relative, _) in path_map.iter() {
        report.examined += 1;
        if !target_root.join(relative).exists() {
            stale.push(relative.clone());
        }
    }

    for relative in stale {
        if let Some(fingerprint) = path_map.unset(&relative) {
            if index.remove(&fingerprint) {
                report.removed += 1;
                log::debug!(
                    "Pruned {} ({})",
                    relative.display(),
                    fingerprint
                );
            }
        }
    }

    index.save()?;
    path_map.save()?;

    log::info!(
        "Prune finished: {} entries examined, {} removed",
        report.examined,
        report.removed
    );
    Ok(report)
}
