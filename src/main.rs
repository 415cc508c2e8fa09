//! audiomerge - Deduplicating Audio Library Merger
//!
//! Entry point for the audiomerge CLI application.

use audiomerge::cli::Cli;
use audiomerge::error::ExitCode;
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    match audiomerge::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}
