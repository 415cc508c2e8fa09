//! Process exit codes.

use crate::engine::RunOutcome;

/// Exit codes for the audiomerge application.
///
/// - 0: Success (run completed with no per-file errors)
/// - 1: General error (fatal setup failure)
/// - 3: Partial success (completed, but some files failed and were skipped)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Run completed cleanly.
    Success = 0,
    /// An unexpected fatal error occurred.
    GeneralError = 1,
    /// Run completed but encountered some non-fatal per-file errors.
    PartialSuccess = 3,
    /// Run was interrupted by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<RunOutcome> for ExitCode {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Ok => Self::Success,
            RunOutcome::PartialSuccess => Self::PartialSuccess,
            RunOutcome::Aborted => Self::Interrupted,
        }
    }
}
