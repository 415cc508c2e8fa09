//! Application configuration.
//!
//! Settings are layered with figment: built-in defaults, then an optional
//! `audiomerge.toml`, then `AUDIOMERGE_*` environment variables, and
//! finally explicit CLI flags on top.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::MergeArgs;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "audiomerge.toml";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "AUDIOMERGE_";

/// Merge settings from config file, environment and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default target library; CLI `--target` overrides it.
    #[serde(default)]
    pub target: Option<PathBuf>,

    /// Delete source files after a safe transfer.
    #[serde(default)]
    pub delete_after: bool,

    /// Progress reporting cadence in files.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Skip PCM decoding and fingerprint raw bytes only.
    #[serde(default)]
    pub byte_hash_only: bool,
}

fn default_progress_every() -> usize {
    25
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target: None,
            delete_after: false,
            progress_every: default_progress_every(),
            byte_hash_only: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `audiomerge.toml` (if present) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparsable config file or an invalid
    /// environment override. Missing files are fine.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE_NAME))
    }

    /// Load configuration from a specific TOML file plus the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .with_context(|| format!("invalid configuration ({})", path.display()))
    }

    /// Overlay explicit CLI flags. Flags the user did not pass leave the
    /// configured values untouched.
    #[must_use]
    pub fn apply_cli(mut self, args: &MergeArgs) -> Self {
        if let Some(ref target) = args.target {
            self.target = Some(target.clone());
        }
        if args.delete_after {
            self.delete_after = true;
        }
        if let Some(every) = args.progress_every {
            self.progress_every = every.max(1);
        }
        if args.byte_hash_only {
            self.byte_hash_only = true;
        }
        self
    }
}
