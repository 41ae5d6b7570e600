//! Binary entrypoint for the `nspec` CLI.

use std::process::ExitCode;

use clap::Parser;
use nspec::cli::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    if let Err(err) = nspec::logging::init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {err}");
    }

    // Record/replay is handled in commands::dispatch via NSPEC_RECORD / NSPEC_REPLAY.
    match nspec::run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            if err == nspec::commands::INTERRUPTED {
                ExitCode::from(nspec::commands::INTERRUPTED_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
