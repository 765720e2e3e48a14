//! # sovabids CLI
//!
//! This is the binary entry point for the `sovabids` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging from the global `--log-level` and `--color` flags.
//! - Executing the appropriate command and reporting top-level errors.
//!
//! The rule resolution and mapping logic lives in the `sovabids` library crate;
//! the binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
