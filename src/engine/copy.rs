//! Copying files into the target library.
//!
//! Copies go to a hidden temp name inside the target directory and are
//! renamed into place afterwards, so a crash or full disk never leaves a
//! half-written file under its final name.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

/// Errors while copying a file into the target library.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// The source path has no usable file name component.
    #[error("no usable file name for {0}")]
    NoFileName(PathBuf),

    /// An I/O error during copy or rename.
    #[error("copy to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copy `source` into `target_root` under a collision-safe name.
///
/// If a file with the same name already exists at the destination (it must
/// hold different content, or the engine would have classified the source
/// as a duplicate), a numeric suffix is appended: `name(1).ext`,
/// `name(2).ext`, and so on. The source modification time is preserved on
/// the copy.
///
/// Returns the final destination path.
pub fn copy_into_target(source: &Path, target_root: &Path) -> Result<PathBuf, CopyError> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CopyError::NoFileName(source.to_path_buf()))?;

    let final_path = unique_target_path(target_root, file_name);
    let tmp_name = format!(
        ".{}.part",
        final_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name)
    );
    let tmp_path = target_root.join(tmp_name);

    let io_err = |path: &Path, source| CopyError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Err(e) = fs::copy(source, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(&tmp_path, e));
    }

    // Preserve the source mtime; a failure here is cosmetic.
    if let Ok(modified) = source.metadata().and_then(|m| m.modified()) {
        if let Err(e) = filetime::set_file_mtime(&tmp_path, FileTime::from_system_time(modified)) {
            log::trace!("could not preserve mtime on {}: {}", tmp_path.display(), e);
        }
    }

    if let Err(e) = fs::rename(&tmp_path, &final_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(&final_path, e));
    }

    Ok(final_path)
}

/// First destination path under `target_root` not occupied by another file.
#[must_use]
pub fn unique_target_path(target_root: &Path, file_name: &str) -> PathBuf {
    let candidate = target_root.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let mut i = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem}({i}).{ext}"),
            None => format!("{stem}({i})"),
        };
        let candidate = target_root.join(name);
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_path_no_collision() {
        let dir = TempDir::new().unwrap();
        let path = unique_target_path(dir.path(), "song.mp3");
        assert_eq!(path, dir.path().join("song.mp3"));
    }

    #[test]
    fn test_unique_path_appends_suffix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        assert_eq!(
            unique_target_path(dir.path(), "song.mp3"),
            dir.path().join("song(1).mp3")
        );

        std::fs::write(dir.path().join("song(1).mp3"), b"y").unwrap();
        assert_eq!(
            unique_target_path(dir.path(), "song.mp3"),
            dir.path().join("song(2).mp3")
        );
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();
        assert_eq!(
            unique_target_path(dir.path(), "README"),
            dir.path().join("README(1)")
        );
    }

    #[test]
    fn test_copy_into_target_copies_bytes_and_mtime() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("song.mp3");
        std::fs::write(&source, vec![0x7Eu8; 4096]).unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, old).unwrap();

        let dest = copy_into_target(&source, dst_dir.path()).unwrap();

        assert_eq!(dest, dst_dir.path().join("song.mp3"));
        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x7Eu8; 4096]);
        let copied_mtime = FileTime::from_last_modification_time(&dest.metadata().unwrap());
        assert_eq!(copied_mtime.unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn test_copy_into_target_leaves_no_temp_files() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("song.mp3");
        std::fs::write(&source, b"content").unwrap();

        copy_into_target(&source, dst_dir.path()).unwrap();

        let names: Vec<_> = std::fs::read_dir(dst_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["song.mp3"]);
    }

    #[test]
    fn test_copy_collision_gets_suffixed_name() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("song.mp3");
        std::fs::write(&source, b"new content").unwrap();
        std::fs::write(dst_dir.path().join("song.mp3"), b"other content").unwrap();

        let dest = copy_into_target(&source, dst_dir.path()).unwrap();

        assert_eq!(dest, dst_dir.path().join("song(1).mp3"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"new content");
        // The existing file is untouched.
        assert_eq!(
            std::fs::read(dst_dir.path().join("song.mp3")).unwrap(),
            b"other content"
        );
    }

    #[test]
    fn test_copy_missing_source_is_error() {
        let dst_dir = TempDir::new().unwrap();
        let result = copy_into_target(Path::new("/nonexistent/song.mp3"), dst_dir.path());
        assert!(matches!(result, Err(CopyError::Io { .. })));
    }
}
