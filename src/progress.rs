//! Progress reporting using indicatif.
//!
//! [`ConsoleProgress`] implements [`ProgressSink`] to display a terminal
//! progress bar while a merge runs. With `--quiet` the bar is suppressed
//! entirely and only log output remains.

use std::path::Path;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{ProgressSink, ProgressSnapshot, RunStats};

/// Terminal progress bar for merge runs.
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl ConsoleProgress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bar will be displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_scan_complete(&self, total: usize) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new(total as u64);
        pb.set_style(Self::bar_style());
        pb.set_message("Merging");
        *self.bar.lock().unwrap() = Some(pb);
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        if self.quiet {
            return;
        }
        if let Some(ref pb) = *self.bar.lock().unwrap() {
            pb.set_position(snapshot.processed as u64);
            pb.set_message(format!(
                "{} new, {} dup, {} err",
                snapshot.copied, snapshot.duplicates, snapshot.errors
            ));
        }
    }

    fn on_file_error(&self, path: &Path, message: &str) {
        if self.quiet {
            return;
        }
        let guard = self.bar.lock().unwrap();
        let line = format!("skipped {}: {}", path.display(), message);
        match *guard {
            // println through the bar so the line is not overdrawn
            Some(ref pb) => pb.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn on_finished(&self, stats: &RunStats) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.bar.lock().unwrap().take() {
            if stats.interrupted {
                pb.abandon_with_message("Interrupted");
            } else {
                pb.finish_with_message("Done");
            }
        }
    }
}
