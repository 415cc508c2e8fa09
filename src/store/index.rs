//! Target content index.
//!
//! A persistent set of fingerprints meaning "this content is already in the
//! library". Persisted as a sorted JSON array of fingerprint strings so the
//! file diffs cleanly between runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::hasher::Fingerprint;
use crate::store::{load_json, save_json, StoreError};

/// Index file name, stored inside the target root.
pub const INDEX_FILE_NAME: &str = ".audiomerge_index.json";

/// Persistent fingerprint set for one target library.
#[derive(Debug)]
pub struct TargetIndex {
    file_path: PathBuf,
    fingerprints: BTreeSet<Fingerprint>,
}

impl TargetIndex {
    /// Location of the index file for a target root.
    #[must_use]
    pub fn file_path(target_root: &Path) -> PathBuf {
        target_root.join(INDEX_FILE_NAME)
    }

    /// Load the index for a target root; a missing file yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] for an unparsable index file — never
    /// silently treated as empty.
    pub fn load(target_root: &Path) -> Result<Self, StoreError> {
        let file_path = Self::file_path(target_root);
        let fingerprints = load_json(&file_path)?;
        Ok(Self {
            file_path,
            fingerprints,
        })
    }

    /// An empty index (explicit reset / recovery path).
    #[must_use]
    pub fn empty(target_root: &Path) -> Self {
        Self {
            file_path: Self::file_path(target_root),
            fingerprints: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Insert a fingerprint; returns `false` if it was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    /// Remove a fingerprint; returns `true` if it was present.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.remove(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Persist the fingerprint set with an atomic replace.
    pub fn save(&self) -> Result<(), StoreError> {
        save_json(&self.file_path, &self.fingerprints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Method;
    use tempfile::TempDir;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::new(Method::Pcm, [byte; 32])
    }

    #[test]
    fn test_insert_contains_remove() {
        let dir = TempDir::new().unwrap();
        let mut index = TargetIndex::empty(dir.path());

        assert!(index.insert(fp(1)));
        assert!(!index.insert(fp(1)), "second insert is a no-op");
        assert!(index.contains(&fp(1)));
        assert!(!index.contains(&fp(2)));

        assert!(index.remove(&fp(1)));
        assert!(!index.remove(&fp(1)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut index = TargetIndex::empty(dir.path());
        index.insert(fp(3));
        index.insert(fp(1));
        index.insert(fp(2));
        index.save().unwrap();

        let reloaded = TargetIndex::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.contains(&fp(1)));
        assert!(reloaded.contains(&fp(2)));
        assert!(reloaded.contains(&fp(3)));
    }

    #[test]
    fn test_persisted_form_is_sorted_strings() {
        let dir = TempDir::new().unwrap();
        let mut index = TargetIndex::empty(dir.path());
        index.insert(fp(2));
        index.insert(fp(1));
        index.save().unwrap();

        let text = std::fs::read_to_string(TargetIndex::file_path(dir.path())).unwrap();
        let values: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(values.len(), 2);
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(values, sorted);
        assert!(values[0].starts_with("pcm:"));
    }

    #[test]
    fn test_missing_index_loads_empty() {
        let dir = TempDir::new().unwrap();
        let index = TargetIndex::load(dir.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(TargetIndex::file_path(dir.path()), "[1, 2, oops").unwrap();

        let result = TargetIndex::load(dir.path());
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
