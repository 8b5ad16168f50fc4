//! Main entry point for the zipsed CLI application.
//!
//! Parses arguments, drives the archive updater once per input file and
//! maps the aggregate failure count to the process exit status: 0 for a
//! clean run, 1 if any archive or member failed, 2 for an invalid
//! invocation (clap reports missing `--command` itself with the same
//! code).

use clap::Parser;
use regex::Regex;
use std::process::ExitCode;

use zipsed::{Cli, UpdateOptions, ZipUpdater};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let pattern = match cli.pattern.as_deref().map(Regex::new).transpose() {
        Ok(pattern) => pattern,
        Err(e) => {
            eprintln!("zipsed: invalid --match pattern: {e}");
            return ExitCode::from(2);
        }
    };

    let updater = ZipUpdater::new(UpdateOptions {
        command: cli.command,
        pattern,
        verbose: cli.verbose,
    });

    let failures = updater.update_all(&cli.files).await;

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
