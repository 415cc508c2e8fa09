//! Content fingerprinting.
//!
//! A [`Fingerprint`] identifies file *content*: preferably a BLAKE3 digest
//! over decoded, normalized PCM samples (so re-encoded but audibly identical
//! files collide), with a raw byte digest as the fallback when decoding is
//! unavailable or fails.
//!
//! PCM and byte fingerprints live in the same value space but are never
//! interchangeable: the method is part of fingerprint identity, and the
//! persisted text form is `pcm:<hex>` or `byte:<hex>`.

pub mod byte;
pub mod pcm;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a fingerprint was computed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Digest over decoded, normalized PCM samples.
    Pcm,
    /// Digest over the raw file bytes.
    Byte,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pcm => "pcm",
            Self::Byte => "byte",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pcm" => Ok(Self::Pcm),
            "byte" => Ok(Self::Byte),
            other => Err(format!("unknown fingerprint method: '{other}'")),
        }
    }
}

/// A content fingerprint: a 256-bit BLAKE3 digest tagged with its method.
///
/// Equality covers both method and digest, so a byte fingerprint can never
/// be mistaken for a PCM fingerprint of the same file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    method: Method,
    digest: [u8; 32],
}

impl Fingerprint {
    #[must_use]
    pub fn new(method: Method, digest: [u8; 32]) -> Self {
        Self { method, digest }
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Lowercase hex encoding of the digest, without the method tag.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        let mut hex = String::with_capacity(64);
        for b in &self.digest {
            hex.push_str(&format!("{b:02x}"));
        }
        hex
    }
}

impl fmt::Display for Fingerprint {
    /// Persisted text form, e.g. `pcm:3f2a…` or `byte:9c41…`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.digest_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (method, hex) = s
            .split_once(':')
            .ok_or_else(|| format!("fingerprint '{s}' is missing a method tag"))?;
        let method = Method::from_str(method)?;
        if hex.len() != 64 {
            return Err(format!(
                "fingerprint digest must be 64 hex characters, got {}",
                hex.len()
            ));
        }
        let mut digest = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| "invalid hex".to_string())?;
            digest[i] =
                u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex: '{pair}'"))?;
        }
        Ok(Self { method, digest })
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur while computing a fingerprint.
///
/// Decode failures are not errors: they trigger the byte fallback. Only a
/// file whose bytes cannot be read at all produces a `HashError`.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Produces content fingerprints for files.
///
/// A trait seam so tests can inject counting or failing hashers and observe
/// exactly when the engine recomputes a fingerprint.
pub trait ContentHasher: Send + Sync {
    /// Compute the fingerprint for a file.
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError>;

    /// The method a fresh hash of this path would attempt.
    ///
    /// This is the capability probe: it depends only on configuration and
    /// the file extension, never on the file's bytes. The merge engine uses
    /// it to invalidate cache entries recorded under a different capability
    /// (e.g. a file byte-hashed while decoding was disabled).
    fn method_for(&self, path: &Path) -> Method;
}

/// Extensions the decoder backend can be expected to handle.
///
/// A subset of [`crate::scanner::AUDIO_EXTENSIONS`]: formats with no
/// decoder support (e.g. wma, ape) go straight to byte hashing.
const DECODABLE_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "aac", "m4a", "alac", "ogg", "aiff", "aif", "aifc", "mka", "caf",
];

/// The default production hasher: PCM first, raw bytes as fallback.
#[derive(Debug, Clone)]
pub struct RobustHasher {
    decode_enabled: bool,
}

impl RobustHasher {
    /// Hasher with PCM decoding enabled for decodable formats.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decode_enabled: true,
        }
    }

    /// Hasher that fingerprints raw bytes only.
    #[must_use]
    pub fn byte_only() -> Self {
        Self {
            decode_enabled: false,
        }
    }

    fn is_decodable(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                DECODABLE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }
}

impl Default for RobustHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for RobustHasher {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        if self.method_for(path) == Method::Pcm {
            match pcm::pcm_digest(path) {
                Ok(digest) => return Ok(Fingerprint::new(Method::Pcm, digest)),
                Err(e) => {
                    log::debug!(
                        "PCM decode failed for {} ({}), falling back to byte hash",
                        path.display(),
                        e
                    );
                }
            }
        }
        byte::byte_digest(path).map(|digest| Fingerprint::new(Method::Byte, digest))
    }

    fn method_for(&self, path: &Path) -> Method {
        if self.decode_enabled && Self::is_decodable(path) {
            Method::Pcm
        } else {
            Method::Byte
        }
    }
}
