//! Recursive directory walk yielding candidate audio files.
//!
//! Uses single-threaded `walkdir` with sorted entries so discovery order is
//! deterministic across runs. Symlinked directories are not descended into,
//! which rules out symlink cycles without having to track visited inodes.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{
    is_audio_path, is_junk_name, mtime_seconds, DiscoveryError, FileRecord, MIN_FILE_SIZE,
};

/// Lazy, restartable enumeration of audio files under one root.
///
/// Each call to [`Discovery::iter`] starts a fresh walk.
///
/// # Example
///
/// ```no_run
/// use audiomerge::scanner::Discovery;
/// use std::path::Path;
///
/// let discovery = Discovery::new(Path::new("/music/incoming"));
/// for item in discovery.iter() {
///     match item {
///         Ok(record) => println!("{}: {} bytes", record.path.display(), record.size),
///         Err(e) => eprintln!("Warning: {}", e),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Discovery {
    root: PathBuf,
}

impl Discovery {
    /// Create a discovery walk rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Walk the tree, yielding file records and per-entry errors.
    ///
    /// Directories that cannot be read produce a [`DiscoveryError`] item and
    /// the walk continues with their siblings.
    pub fn iter(&self) -> impl Iterator<Item = Result<FileRecord, DiscoveryError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }

                    let name = entry.file_name().to_string_lossy();
                    if is_junk_name(&name) {
                        log::trace!("Skipping junk file: {}", entry.path().display());
                        return None;
                    }
                    if !is_audio_path(entry.path()) {
                        return None;
                    }

                    // Persisted stores key by path as a JSON string, so a
                    // candidate whose path is not UTF-8 cannot be tracked.
                    if entry.path().to_str().is_none() {
                        return Some(Err(DiscoveryError::NonUtf8Path(entry.into_path())));
                    }

                    let metadata = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => {
                            let io = e
                                .into_io_error()
                                .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                            return Some(Err(DiscoveryError::from_io(entry.path(), io)));
                        }
                    };

                    let size = metadata.len();
                    if size < MIN_FILE_SIZE {
                        log::debug!(
                            "Skipping suspiciously small file ({} bytes): {}",
                            size,
                            entry.path().display()
                        );
                        return None;
                    }

                    let modified = metadata
                        .modified()
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

                    Some(Ok(FileRecord {
                        path: entry.into_path(),
                        size,
                        mtime: mtime_seconds(modified),
                    }))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    let io = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    Some(Err(DiscoveryError::from_io(&path, io)))
                }
            })
    }
}
