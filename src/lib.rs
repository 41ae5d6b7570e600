//! Core library entry for the `nspec` CLI.
//!
//! A spec moves through four stages (requirements, design, tasks, verify),
//! each a markdown document streamed from a language model and stored under
//! the workspace's specs folder. [`pipeline::Controller`] drives the stages;
//! everything that touches the outside world goes through the traits in
//! [`ports`].

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod import;
pub mod logging;
pub mod pipeline;
pub mod ports;
pub mod prompts;
pub mod spec;
pub mod stage;
pub mod store;

#[cfg(test)]
mod testing;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    run_cli(&cli)
}

/// Run an already parsed command line.
///
/// # Errors
///
/// Returns an error string when command execution fails.
pub fn run_cli(cli: &cli::Cli) -> Result<(), String> {
    commands::dispatch(cli)
}
