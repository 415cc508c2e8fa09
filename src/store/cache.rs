//! Per-source hash cache.
//!
//! One cache file per source root, keyed by absolute path. An entry is
//! valid only while its recorded size and modification time exactly match
//! the file on disk, and only while the hasher's capability probe still
//! matches the one the entry was recorded under — so enabling or disabling
//! PCM decoding between runs forces re-evaluation instead of silently
//! trusting a fingerprint computed the other way.
//!
//! Entries for vanished files are left in place (except in
//! delete-after-transfer mode, where the engine removes them): a stale
//! entry wastes a little space but can never cause a wrong dedup decision,
//! because lookup always revalidates size and mtime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hasher::{Fingerprint, Method};
use crate::store::{load_json, save_json, StoreError};

/// Cache file name, stored inside the source root.
pub const CACHE_FILE_NAME: &str = ".audiomerge_cache.json";

/// One cached fingerprint with its validation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File size in bytes at hash time
    pub size: u64,
    /// Modification time (Unix seconds) at hash time
    pub mtime: i64,
    /// The computed fingerprint
    pub fingerprint: Fingerprint,
    /// The method the capability probe selected at hash time.
    ///
    /// May differ from `fingerprint`'s method when decoding was attempted
    /// but failed for this particular file.
    pub probe: Method,
}

/// Persistent path → [`CacheEntry`] map for one source root.
#[derive(Debug)]
pub struct SourceCache {
    file_path: PathBuf,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl SourceCache {
    /// Location of the cache file for a source root.
    #[must_use]
    pub fn file_path(source_root: &Path) -> PathBuf {
        source_root.join(CACHE_FILE_NAME)
    }

    /// Load the cache for a source root; a missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] for an unparsable cache file — the
    /// caller decides whether to abort or rebuild from empty.
    pub fn load(source_root: &Path) -> Result<Self, StoreError> {
        let file_path = Self::file_path(source_root);
        let entries = load_json(&file_path)?;
        Ok(Self { file_path, entries })
    }

    /// An empty cache for a source root (used when rebuilding after corruption).
    #[must_use]
    pub fn empty(source_root: &Path) -> Self {
        Self {
            file_path: Self::file_path(source_root),
            entries: BTreeMap::new(),
        }
    }

    /// Return the cached fingerprint for a path, if still valid.
    ///
    /// A hit requires the stored size and mtime to exactly match the current
    /// file metadata and the stored probe to match `probe`.
    #[must_use]
    pub fn lookup(&self, path: &Path, size: u64, mtime: i64, probe: Method) -> Option<Fingerprint> {
        let entry = self.entries.get(path)?;
        if entry.size == size && entry.mtime == mtime && entry.probe == probe {
            Some(entry.fingerprint)
        } else {
            None
        }
    }

    /// Record a freshly computed fingerprint.
    pub fn update(
        &mut self,
        path: PathBuf,
        size: u64,
        mtime: i64,
        fingerprint: Fingerprint,
        probe: Method,
    ) {
        self.entries.insert(
            path,
            CacheEntry {
                size,
                mtime,
                fingerprint,
                probe,
            },
        );
    }

    /// Drop the entry for a path (the file was deleted from the source).
    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the full mapping with an atomic replace.
    pub fn save(&self) -> Result<(), StoreError> {
        save_json(&self.file_path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::new(Method::Byte, [byte; 32])
    }

    #[test]
    fn test_lookup_requires_exact_size_and_mtime() {
        let dir = TempDir::new().unwrap();
        let mut cache = SourceCache::empty(dir.path());
        let path = PathBuf::from("/src/a.mp3");
        cache.update(path.clone(), 100, 1_700_000_000, fp(1), Method::Byte);

        assert_eq!(
            cache.lookup(&path, 100, 1_700_000_000, Method::Byte),
            Some(fp(1))
        );
        assert_eq!(cache.lookup(&path, 101, 1_700_000_000, Method::Byte), None);
        assert_eq!(cache.lookup(&path, 100, 1_700_000_001, Method::Byte), None);
        assert_eq!(cache.lookup(Path::new("/src/b.mp3"), 100, 1_700_000_000, Method::Byte), None);
    }

    #[test]
    fn test_lookup_invalidated_by_probe_change() {
        let dir = TempDir::new().unwrap();
        let mut cache = SourceCache::empty(dir.path());
        let path = PathBuf::from("/src/a.mp3");
        // Fingerprinted while decoding was unavailable.
        cache.update(path.clone(), 100, 1_700_000_000, fp(1), Method::Byte);

        // Decoder now available: the byte fingerprint must not be reused.
        assert_eq!(cache.lookup(&path, 100, 1_700_000_000, Method::Pcm), None);
    }

    #[test]
    fn test_probe_recorded_even_when_decode_failed() {
        let dir = TempDir::new().unwrap();
        let mut cache = SourceCache::empty(dir.path());
        let path = PathBuf::from("/src/broken.mp3");
        // Probe said Pcm, but decode failed, so the stored fingerprint is a
        // byte fingerprint. The entry stays valid while the probe is Pcm.
        cache.update(path.clone(), 100, 1, fp(9), Method::Pcm);

        assert_eq!(cache.lookup(&path, 100, 1, Method::Pcm), Some(fp(9)));
        assert_eq!(cache.lookup(&path, 100, 1, Method::Byte), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut cache = SourceCache::empty(dir.path());
        cache.update(PathBuf::from("/src/a.mp3"), 10, 1, fp(1), Method::Byte);
        cache.update(PathBuf::from("/src/b.mp3"), 20, 2, fp(2), Method::Pcm);
        cache.save().unwrap();

        let reloaded = SourceCache::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.lookup(Path::new("/src/a.mp3"), 10, 1, Method::Byte),
            Some(fp(1))
        );
        assert_eq!(
            reloaded.lookup(Path::new("/src/b.mp3"), 20, 2, Method::Pcm),
            Some(fp(2))
        );
    }

    #[test]
    fn test_remove_entry() {
        let dir = TempDir::new().unwrap();
        let mut cache = SourceCache::empty(dir.path());
        let path = PathBuf::from("/src/a.mp3");
        cache.update(path.clone(), 10, 1, fp(1), Method::Byte);
        cache.remove(&path);

        assert!(cache.is_empty());
        assert_eq!(cache.lookup(&path, 10, 1, Method::Byte), None);
    }

    #[test]
    fn test_missing_cache_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache = SourceCache::load(dir.path()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_cache_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(SourceCache::file_path(dir.path()), "garbage").unwrap();

        let result = SourceCache::load(dir.path());
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
