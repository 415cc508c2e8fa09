//! The merge engine.
//!
//! Orchestrates the scan → cache lookup → hash → index check → copy →
//! update pipeline for one (source root, target root) pair:
//!
//! 1. Discovery enumerates candidate audio files.
//! 2. The source cache is consulted; only changed or unknown files are
//!    re-fingerprinted.
//! 3. The target index decides copy-or-skip: content already present is a
//!    duplicate and is never copied again.
//! 4. Copies are atomic (temp name + rename) with collision-safe naming;
//!    successful copies update the index and the path map.
//! 5. With delete-after-transfer, sources whose content is safely in the
//!    target are deleted and their cache entries dropped.
//!
//! Any per-file failure is counted and logged; the run always continues to
//! the next candidate. Cache, index and path map are flushed once at the
//! end of the run — including after cancellation, so an aborted run keeps
//! the hashing work it has already paid for.

pub mod copy;
pub mod prune;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::hasher::{ContentHasher, RobustHasher};
use crate::scanner::Discovery;
use crate::store::{PathMap, SourceCache, StoreError, TargetIndex};

pub use prune::{prune, PruneReport};

/// Options for one merge run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Delete source files once their content is safely in the target.
    pub delete_after: bool,
    /// Emit a progress snapshot every N processed files (≥ 1).
    pub progress_every: usize,
    /// Decide and count, but write nothing and delete nothing.
    pub dry_run: bool,
    /// Reset a stale or corrupt target index to empty instead of aborting.
    pub reset_index: bool,
    /// Rebuild a corrupt source cache from empty instead of aborting.
    pub rebuild_cache: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            delete_after: false,
            progress_every: 25,
            dry_run: false,
            reset_index: false,
            rebuild_cache: false,
        }
    }
}

/// Outcome counters for one run (or several runs combined).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Candidates discovered by the scan
    pub total_candidates: usize,
    /// Candidates the pipeline reached (≤ total after an abort)
    pub processed: usize,
    /// New files copied into the target
    pub copied: usize,
    /// Candidates whose content was already present
    pub duplicates: usize,
    /// Per-file failures (discovery, hashing, copying)
    pub errors: usize,
    /// Source deletions that failed after a safe copy (data intact)
    pub delete_warnings: usize,
    /// Total bytes copied
    pub copied_bytes: u64,
    /// Whether the run was cancelled before completing
    pub interrupted: bool,
}

impl RunStats {
    /// Classify the run for the caller.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        if self.interrupted {
            RunOutcome::Aborted
        } else if self.errors > 0 {
            RunOutcome::PartialSuccess
        } else {
            RunOutcome::Ok
        }
    }

    /// Fold another run's counters into this one (multi-source runs).
    pub fn absorb(&mut self, other: &RunStats) {
        self.total_candidates += other.total_candidates;
        self.processed += other.processed;
        self.copied += other.copied;
        self.duplicates += other.duplicates;
        self.errors += other.errors;
        self.delete_warnings += other.delete_warnings;
        self.copied_bytes += other.copied_bytes;
        self.interrupted |= other.interrupted;
    }
}

/// How a completed run is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Completed without per-file errors.
    Ok,
    /// Completed, but some files failed and were skipped.
    PartialSuccess,
    /// Cancelled before the candidate list was exhausted.
    Aborted,
}

/// A progress snapshot emitted every `progress_every` files.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub copied: usize,
    pub duplicates: usize,
    pub errors: usize,
    /// Estimated time remaining, from elapsed time and remaining candidates.
    pub eta: Option<Duration>,
}

/// Receives progress events from a running merge.
///
/// Implementations must not block: the engine calls these inline between
/// files. All methods have empty defaults so sinks implement only what
/// they display.
pub trait ProgressSink: Send + Sync {
    /// The scan finished; `total` candidates will be processed.
    fn on_scan_complete(&self, _total: usize) {}

    /// Periodic progress snapshot.
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}

    /// A file failed and was skipped.
    fn on_file_error(&self, _path: &Path, _message: &str) {}

    /// The run ended (completed or aborted).
    fn on_finished(&self, _stats: &RunStats) {}
}

/// Fatal setup failures: nothing has been processed when these occur.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("source root {0} is not an accessible directory")]
    SourceUnavailable(PathBuf),

    #[error("target root {path} is not usable: {source}")]
    TargetUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target holds no audio files but its index is non-empty. This is
    /// ambiguous (cleared library, or misconfigured target path?) and is
    /// never resolved automatically.
    #[error(
        "target library {0} holds no audio files but its index is not empty; \
         pass --reset-index to rebuild the index from scratch"
    )]
    StaleIndex(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives the merge pipeline for one source/target pair.
///
/// Generic over the hasher so tests can observe or stub fingerprinting;
/// production code uses [`RobustHasher`].
pub struct MergeEngine<H = RobustHasher> {
    hasher: H,
    options: MergeOptions,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl MergeEngine<RobustHasher> {
    /// Engine with the default PCM-first hasher.
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        Self::with_hasher(RobustHasher::new(), options)
    }
}

impl<H: ContentHasher> MergeEngine<H> {
    /// Engine with a caller-supplied hasher.
    #[must_use]
    pub fn with_hasher(hasher: H, options: MergeOptions) -> Self {
        Self {
            hasher,
            options,
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Set the cancellation flag, checked between files.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress sink.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Run the merge for one source root into one target root.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] only for fatal setup failures. Per-file
    /// failures are counted in the returned [`RunStats`] instead.
    pub fn run(&self, source_root: &Path, target_root: &Path) -> Result<RunStats, MergeError> {
        if !source_root.is_dir() {
            return Err(MergeError::SourceUnavailable(source_root.to_path_buf()));
        }
        let source_root = source_root
            .canonicalize()
            .map_err(|_| MergeError::SourceUnavailable(source_root.to_path_buf()))?;

        fs::create_dir_all(target_root).map_err(|e| MergeError::TargetUnavailable {
            path: target_root.to_path_buf(),
            source: e,
        })?;
        let target_root = target_root
            .canonicalize()
            .map_err(|e| MergeError::TargetUnavailable {
                path: target_root.to_path_buf(),
                source: e,
            })?;

        let mut cache = self.load_cache(&source_root)?;
        let (mut index, mut path_map) = self.load_target_state(&target_root)?;

        log::info!(
            "Merging {} into {} ({} cached fingerprints, {} indexed)",
            source_root.display(),
            target_root.display(),
            cache.len(),
            index.len()
        );

        let mut stats = RunStats::default();

        // Collect the candidate list up front; the total drives the ETA.
        let discovery = Discovery::new(&source_root);
        let mut records = Vec::new();
        for item in discovery.iter() {
            match item {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("Scan error: {e}");
                    stats.errors += 1;
                    if let Some(ref sink) = self.progress {
                        sink.on_file_error(e.path(), &e.to_string());
                    }
                }
            }
        }
        stats.total_candidates = records.len();
        if let Some(ref sink) = self.progress {
            sink.on_scan_complete(records.len());
        }
        log::info!("Found {} candidate files", records.len());

        let started = Instant::now();
        let progress_every = self.options.progress_every.max(1);
        for record in records {
            if self.is_shutdown_requested() {
                log::info!("Cancellation requested, stopping before next file");
                stats.interrupted = true;
                break;
            }

            self.process_file(&record, &target_root, &mut cache, &mut index, &mut path_map, &mut stats);
            stats.processed += 1;

            if stats.processed % progress_every == 0 {
                self.emit_progress(&stats, started);
            }
        }
        // Final tick when the total is not a multiple of the cadence.
        if stats.processed % progress_every != 0 {
            self.emit_progress(&stats, started);
        }

        // Flush even after an abort: partial persistence beats losing the
        // hashing work done so far.
        if !self.options.dry_run {
            cache.save()?;
            index.save()?;
            path_map.save()?;
        }

        if let Some(ref sink) = self.progress {
            sink.on_finished(&stats);
        }
        log::info!(
            "Run finished: {} copied, {} duplicates, {} errors, {} processed",
            stats.copied,
            stats.duplicates,
            stats.errors,
            stats.processed
        );

        Ok(stats)
    }

    fn load_cache(&self, source_root: &Path) -> Result<SourceCache, MergeError> {
        match SourceCache::load(source_root) {
            Ok(cache) => Ok(cache),
            Err(StoreError::Corrupt { path, source }) if self.options.rebuild_cache => {
                log::warn!("Rebuilding corrupt source cache {}: {}", path.display(), source);
                Ok(SourceCache::empty(source_root))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_target_state(&self, target_root: &Path) -> Result<(TargetIndex, PathMap), MergeError> {
        let index = match TargetIndex::load(target_root) {
            Ok(index) => index,
            Err(StoreError::Corrupt { path, source }) if self.options.reset_index => {
                log::warn!("Resetting corrupt target index {}: {}", path.display(), source);
                return Ok((TargetIndex::empty(target_root), PathMap::empty(target_root)));
            }
            Err(e) => return Err(e.into()),
        };

        // An index with entries but no audio files behind it is ambiguous;
        // require an explicit reset.
        if !index.is_empty() && !has_audio_files(target_root) {
            if self.options.reset_index {
                log::warn!(
                    "Target {} is empty; resetting its non-empty index",
                    target_root.display()
                );
                return Ok((TargetIndex::empty(target_root), PathMap::empty(target_root)));
            }
            return Err(MergeError::StaleIndex(target_root.to_path_buf()));
        }

        // The map is maintained in lock-step with the index, so an index
        // reset covers a corrupt map too.
        let path_map = match PathMap::load(target_root) {
            Ok(map) => map,
            Err(StoreError::Corrupt { path, source }) if self.options.reset_index => {
                log::warn!("Resetting corrupt path map {}: {}", path.display(), source);
                PathMap::empty(target_root)
            }
            Err(e) => return Err(e.into()),
        };
        Ok((index, path_map))
    }

    fn process_file(
        &self,
        record: &crate::scanner::FileRecord,
        target_root: &Path,
        cache: &mut SourceCache,
        index: &mut TargetIndex,
        path_map: &mut PathMap,
        stats: &mut RunStats,
    ) {
        let probe = self.hasher.method_for(&record.path);
        let fingerprint = match cache.lookup(&record.path, record.size, record.mtime, probe) {
            Some(fp) => {
                log::trace!("Cache hit: {}", record.path.display());
                fp
            }
            None => match self.hasher.fingerprint(&record.path) {
                Ok(fp) => {
                    cache.update(record.path.clone(), record.size, record.mtime, fp, probe);
                    fp
                }
                Err(e) => {
                    log::warn!("Hashing failed: {e}");
                    stats.errors += 1;
                    if let Some(ref sink) = self.progress {
                        sink.on_file_error(&record.path, &e.to_string());
                    }
                    return;
                }
            },
        };

        if index.contains(&fingerprint) {
            log::debug!("Duplicate content, skipping: {}", record.path.display());
            stats.duplicates += 1;
            // Content already preserved in the target: the source copy is
            // still eligible for deletion.
            if self.options.delete_after && !self.options.dry_run {
                self.delete_source(&record.path, cache, stats);
            }
            return;
        }

        if self.options.dry_run {
            log::info!("[dry-run] would copy {}", record.path.display());
            index.insert(fingerprint);
            stats.copied += 1;
            stats.copied_bytes += record.size;
            return;
        }

        match copy::copy_into_target(&record.path, target_root) {
            Ok(dest) => {
                index.insert(fingerprint);
                let relative = dest
                    .strip_prefix(target_root)
                    .unwrap_or(&dest)
                    .to_path_buf();
                path_map.set(relative, fingerprint);
                stats.copied += 1;
                stats.copied_bytes += record.size;
                log::debug!("Copied {} -> {}", record.path.display(), dest.display());

                if self.options.delete_after {
                    self.delete_source(&record.path, cache, stats);
                }
            }
            Err(e) => {
                log::warn!("Copy failed: {e}");
                stats.errors += 1;
                if let Some(ref sink) = self.progress {
                    sink.on_file_error(&record.path, &e.to_string());
                }
            }
        }
    }

    /// Delete a transferred source file and drop its cache entry.
    ///
    /// A failed deletion is a warning, not an error: the copy and index
    /// update already succeeded, so the data is safe and only cleanup is
    /// incomplete.
    fn delete_source(&self, path: &Path, cache: &mut SourceCache, stats: &mut RunStats) {
        match fs::remove_file(path) {
            Ok(()) => {
                cache.remove(path);
                log::debug!("Deleted source file {}", path.display());
            }
            Err(e) => {
                log::warn!(
                    "Could not delete source file {} ({}); target copy is intact",
                    path.display(),
                    e
                );
                stats.delete_warnings += 1;
            }
        }
    }

    fn emit_progress(&self, stats: &RunStats, started: Instant) {
        let Some(ref sink) = self.progress else {
            return;
        };
        let eta = estimate_remaining(started.elapsed(), stats.processed, stats.total_candidates);
        sink.on_progress(&ProgressSnapshot {
            processed: stats.processed,
            total: stats.total_candidates,
            copied: stats.copied,
            duplicates: stats.duplicates,
            errors: stats.errors,
            eta,
        });
    }
}

/// Whether a directory tree contains at least one recognized audio file.
fn has_audio_files(root: &Path) -> bool {
    Discovery::new(root)
        .iter()
        .filter_map(Result::ok)
        .next()
        .is_some()
}

/// Estimated time remaining from throughput so far.
fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Option<Duration> {
    if processed == 0 || total <= processed {
        return None;
    }
    let per_file = elapsed.as_secs_f64() / processed as f64;
    let remaining = (total - processed) as f64;
    Some(Duration::from_secs_f64(per_file * remaining))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_outcome_classification() {
        let mut stats = RunStats::default();
        assert_eq!(stats.outcome(), RunOutcome::Ok);

        stats.errors = 2;
        assert_eq!(stats.outcome(), RunOutcome::PartialSuccess);

        stats.interrupted = true;
        assert_eq!(stats.outcome(), RunOutcome::Aborted);
    }

    #[test]
    fn test_stats_absorb() {
        let mut a = RunStats {
            total_candidates: 10,
            processed: 10,
            copied: 4,
            duplicates: 5,
            errors: 1,
            delete_warnings: 0,
            copied_bytes: 4096,
            interrupted: false,
        };
        let b = RunStats {
            total_candidates: 3,
            processed: 2,
            copied: 1,
            duplicates: 1,
            errors: 0,
            delete_warnings: 1,
            copied_bytes: 1024,
            interrupted: true,
        };
        a.absorb(&b);

        assert_eq!(a.total_candidates, 13);
        assert_eq!(a.processed, 12);
        assert_eq!(a.copied, 5);
        assert_eq!(a.duplicates, 6);
        assert_eq!(a.errors, 1);
        assert_eq!(a.delete_warnings, 1);
        assert_eq!(a.copied_bytes, 5120);
        assert!(a.interrupted);
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Duration::from_secs(10), 0, 100), None);
        assert_eq!(estimate_remaining(Duration::from_secs(10), 100, 100), None);

        let eta = estimate_remaining(Duration::from_secs(10), 50, 100).unwrap();
        assert_eq!(eta.as_secs(), 10);
    }

    #[test]
    fn test_default_options() {
        let options = MergeOptions::default();
        assert!(!options.delete_after);
        assert_eq!(options.progress_every, 25);
        assert!(!options.dry_run);
        assert!(!options.reset_index);
        assert!(!options.rebuild_cache);
    }
}
