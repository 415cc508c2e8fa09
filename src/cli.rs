//! Command-line interface definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Merge audio collections into a deduplicated target library.
#[derive(Parser, Debug)]
#[command(name = "audiomerge", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a configuration file (default: ./audiomerge.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge one or more source directories into the target library
    Merge(MergeArgs),
    /// Drop index entries for target files that were deleted by hand
    Prune(PruneArgs),
}

/// Arguments for the merge subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Source directories to merge
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Target library directory (falls back to the configured target)
    #[arg(short, long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Delete source files once their content is safely in the target
    #[arg(long)]
    pub delete_after: bool,

    /// Emit a progress update every N files
    #[arg(long, value_name = "N")]
    pub progress_every: Option<usize>,

    /// Fingerprint raw bytes only, skipping audio decoding
    #[arg(long)]
    pub byte_hash_only: bool,

    /// Decide and report, but copy and delete nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Reset a stale or corrupt target index instead of aborting
    #[arg(long)]
    pub reset_index: bool,

    /// Rebuild a corrupt source cache from scratch instead of aborting
    #[arg(long)]
    pub rebuild_cache: bool,
}

/// Arguments for the prune subcommand.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Target library directory to prune
    #[arg(value_name = "DIR")]
    pub target: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_merge() {
        let cli = Cli::parse_from(["audiomerge", "merge", "/music/incoming"]);
        match cli.command {
            Commands::Merge(args) => {
                assert_eq!(args.sources, vec![PathBuf::from("/music/incoming")]);
                assert_eq!(args.target, None);
                assert!(!args.delete_after);
                assert!(!args.dry_run);
            }
            Commands::Prune(_) => panic!("expected merge"),
        }
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_full_merge() {
        let cli = Cli::parse_from([
            "audiomerge",
            "-vv",
            "merge",
            "/a",
            "/b",
            "--target",
            "/library",
            "--delete-after",
            "--progress-every",
            "50",
            "--byte-hash-only",
            "--dry-run",
            "--reset-index",
            "--rebuild-cache",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Merge(args) => {
                assert_eq!(args.sources.len(), 2);
                assert_eq!(args.target, Some(PathBuf::from("/library")));
                assert!(args.delete_after);
                assert_eq!(args.progress_every, Some(50));
                assert!(args.byte_hash_only);
                assert!(args.dry_run);
                assert!(args.reset_index);
                assert!(args.rebuild_cache);
            }
            Commands::Prune(_) => panic!("expected merge"),
        }
    }

    #[test]
    fn test_merge_requires_a_source() {
        assert!(Cli::try_parse_from(["audiomerge", "merge"]).is_err());
    }

    #[test]
    fn test_parse_prune() {
        let cli = Cli::parse_from(["audiomerge", "prune", "/library"]);
        match cli.command {
            Commands::Prune(args) => assert_eq!(args.target, PathBuf::from("/library")),
            Commands::Merge(_) => panic!("expected prune"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["audiomerge", "-q", "-v", "merge", "/a"]).is_err());
    }

    #[test]
    fn test_cli_asserts() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
