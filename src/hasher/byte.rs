//! Raw byte fingerprinting with streaming BLAKE3.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::HashError;

/// Read buffer size for streaming hashes.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Compute a BLAKE3 digest over the raw bytes of a file.
///
/// Streams through a 1 MiB buffer so memory use is constant regardless of
/// file size.
///
/// # Errors
///
/// Returns a [`HashError`] when the file cannot be opened or read.
pub fn byte_digest(path: &Path) -> Result<[u8; 32], HashError> {
    let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut reader, &mut hasher).map_err(|e| HashError::from_io(path, e))?;
    Ok(*hasher.finalize().as_bytes())
}
