#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use clap::Parser;
use std::process::ExitCode;

use cli::Cli;

fn main() -> ExitCode {
    let cli    = Cli::parse();
    let _guard = infra::logging::init_logging(cli.log_dir().as_deref());

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // last line of the log: the full cause chain, epoch and batch included
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
