//! Target path → fingerprint map.
//!
//! Maintained in lock-step with [`crate::store::TargetIndex`]: every copied
//! file records its (target-relative) path here, so later tooling that
//! deletes or moves a target file can find and remove the matching index
//! entry in O(1) instead of re-hashing the library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hasher::Fingerprint;
use crate::store::{load_json, save_json, StoreError};

/// Map file name, stored inside the target root.
pub const PATH_MAP_FILE_NAME: &str = ".audiomerge_paths.json";

/// Persistent relative-path → fingerprint map for one target library.
#[derive(Debug)]
pub struct PathMap {
    file_path: PathBuf,
    entries: BTreeMap<PathBuf, Fingerprint>,
}

impl PathMap {
    /// Location of the map file for a target root.
    #[must_use]
    pub fn file_path(target_root: &Path) -> PathBuf {
        target_root.join(PATH_MAP_FILE_NAME)
    }

    /// Load the map for a target root; a missing file yields an empty map.
    pub fn load(target_root: &Path) -> Result<Self, StoreError> {
        let file_path = Self::file_path(target_root);
        let entries = load_json(&file_path)?;
        Ok(Self { file_path, entries })
    }

    /// An empty map (explicit reset / recovery path).
    #[must_use]
    pub fn empty(target_root: &Path) -> Self {
        Self {
            file_path: Self::file_path(target_root),
            entries: BTreeMap::new(),
        }
    }

    /// Record the fingerprint stored at a target-relative path.
    pub fn set(&mut self, relative_path: PathBuf, fingerprint: Fingerprint) {
        self.entries.insert(relative_path, fingerprint);
    }

    /// Remove a path entry, returning its fingerprint if it was present.
    pub fn unset(&mut self, relative_path: &Path) -> Option<Fingerprint> {
        self.entries.remove(relative_path)
    }

    #[must_use]
    pub fn get(&self, relative_path: &Path) -> Option<&Fingerprint> {
        self.entries.get(relative_path)
    }

    /// Iterate over all (relative path, fingerprint) entries.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Fingerprint)> {
        self.entries.iter()
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
    use crate::hasher::Method;
    use tempfile::TempDir;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::new(Method::Byte, [byte; 32])
    }

    #[test]
    fn test_set_get_unset() {
        let dir = TempDir::new().unwrap();
        let mut map = PathMap::empty(dir.path());
        map.set(PathBuf::from("song.mp3"), fp(1));

        assert_eq!(map.get(Path::new("song.mp3")), Some(&fp(1)));
        assert_eq!(map.unset(Path::new("song.mp3")), Some(fp(1)));
        assert_eq!(map.unset(Path::new("song.mp3")), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut map = PathMap::empty(dir.path());
        map.set(PathBuf::from("a.mp3"), fp(1));
        map.set(PathBuf::from("album/b.flac"), fp(2));
        map.save().unwrap();

        let reloaded = PathMap::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(Path::new("a.mp3")), Some(&fp(1)));
        assert_eq!(reloaded.get(Path::new("album/b.flac")), Some(&fp(2)));
    }

    #[test]
    fn test_missing_map_loads_empty() {
        let dir = TempDir::new().unwrap();
        let map = PathMap::load(dir.path()).unwrap();
        assert!(map.is_empty());
    }
}
