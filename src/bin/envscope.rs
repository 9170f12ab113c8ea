// src/bin/envscope.rs

use clap::Parser;
use colored::*;
use envscope::cli::{Cli, dispatcher};

/// Sets up logging, parses arguments, dispatches, and prints any error in one place.
fn main() {
    env_logger::init();

    if let Err(e) = dispatcher::dispatch(Cli::parse()) {
        // `{:#}` keeps the underlying cause, e.g. the I/O error behind a failed save.
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}
