//! Discovery of candidate audio files.
//!
//! The scanner walks a source root recursively and yields a [`FileRecord`]
//! for every recognized audio file, together with the metadata the merge
//! engine needs for cache validation (size and modification time).
//!
//! Unreadable directories or files are surfaced as [`DiscoveryError`] items
//! in the same sequence instead of aborting the walk.

pub mod discover;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub use discover::Discovery;

/// Recognized audio file extensions (matched case-insensitively).
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "aac", "m4a", "alac", "ogg", "opus", "wma", "aiff", "aif", "aifc",
    "ape", "wv", "mka", "dsd", "pcm", "ra", "rm", "mid", "midi",
];

/// Files smaller than this are treated as suspicious pseudo-audio and skipped.
pub const MIN_FILE_SIZE: u64 = 1024;

/// Metadata for a discovered candidate file.
///
/// Created by [`Discovery`], consumed by the merge engine; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Modification time in whole seconds since the Unix epoch
    pub mtime: i64,
}

/// Errors that can occur while scanning a directory tree.
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The path is not valid UTF-8 and cannot be tracked in the persisted
    /// stores (which hold paths as JSON strings).
    #[error("Non-UTF-8 path: {0}")]
    NonUtf8Path(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(path) | Self::NotFound(path) | Self::NonUtf8Path(path) => path,
            Self::Io { path, .. } => path,
        }
    }

    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Check whether a path carries a recognized audio extension.
#[must_use]
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Check for well-known OS junk files (AppleDouble, Finder and Explorer litter).
#[must_use]
pub fn is_junk_name(name: &str) -> bool {
    name.starts_with("._")
        || name.eq_ignore_ascii_case(".DS_Store")
        || name.eq_ignore_ascii_case("Thumbs.db")
        || name.eq_ignore_ascii_case("desktop.ini")
}

/// Modification time as whole seconds since the Unix epoch.
///
/// Second granularity is enough for change detection and keeps the persisted
/// cache format portable across filesystems with different timestamp
/// resolutions.
#[must_use]
pub fn mtime_seconds(modified: SystemTime) -> i64 {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
