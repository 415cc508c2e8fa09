//! audiomerge - Deduplicating Audio Library Merger
//!
//! Merges audio collections into a single target library, skipping files
//! whose decoded audio content is already present. Duplicates are detected
//! by BLAKE3 fingerprints over normalized PCM, so the same recording in a
//! different container or at a different bitrate-metadata combination
//! still counts as one file; undecodable files fall back to raw byte
//! hashing.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;

use crate::cli::{Cli, Commands, MergeArgs, PruneArgs};
use crate::config::AppConfig;
use crate::engine::{MergeEngine, MergeOptions, RunStats};
use crate::error::ExitCode;
use crate::hasher::RobustHasher;
use crate::progress::ConsoleProgress;

/// Run the application with parsed CLI arguments.
///
/// # Errors
///
/// Returns an error for fatal setup failures (bad configuration,
/// unavailable roots, corrupt stores without a recovery flag). Per-file
/// failures during a merge are reflected in the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Merge(ref args) => run_merge(&cli, args),
        Commands::Prune(ref args) => run_prune(args),
    }
}

fn run_merge(cli: &Cli, args: &MergeArgs) -> Result<ExitCode> {
    let config = match cli.config {
        Some(ref path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let config = config.apply_cli(args);

    let Some(ref target) = config.target else {
        bail!("no target library given; pass --target or set one in audiomerge.toml");
    };

    let handler = signal::install_handler().context("could not install signal handler")?;

    let options = MergeOptions {
        delete_after: config.delete_after,
        progress_every: config.progress_every,
        dry_run: args.dry_run,
        reset_index: args.reset_index,
        rebuild_cache: args.rebuild_cache,
    };
    let hasher = if config.byte_hash_only {
        RobustHasher::byte_only()
    } else {
        RobustHasher::new()
    };
    let engine = MergeEngine::with_hasher(hasher, options)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_sink(Arc::new(ConsoleProgress::new(cli.quiet)));

    let mut totals = RunStats::default();
    for source in &args.sources {
        if handler.is_shutdown_requested() {
            totals.interrupted = true;
            break;
        }
        let stats = engine
            .run(source, target)
            .with_context(|| format!("merging {}", source.display()))?;
        totals.absorb(&stats);
    }

    if !cli.quiet {
        print_summary(&totals);
    }
    Ok(ExitCode::from(totals.outcome()))
}

fn run_prune(args: &PruneArgs) -> Result<ExitCode> {
    let report = engine::prune(&args.target)
        .with_context(|| format!("pruning {}", args.target.display()))?;
    println!(
        "Pruned {} of {} indexed files",
        report.removed, report.examined
    );
    Ok(ExitCode::Success)
}

fn print_summary(stats: &RunStats) {
    println!();
    println!("Copied:               {}", stats.copied);
    println!("Duplicates (content): {}", stats.duplicates);
    println!("Errors:               {}", stats.errors);
    println!("Processed:            {}", stats.processed);
    println!("Transferred:          {}", ByteSize(stats.copied_bytes));
    if stats.delete_warnings > 0 {
        println!("Deletion warnings:    {}", stats.delete_warnings);
    }
    if stats.interrupted {
        println!("Run was interrupted; progress has been saved.");
    }
}
