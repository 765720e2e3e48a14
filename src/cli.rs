//! CLI argument parsing and command dispatch

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use env_logger::WriteStyle;
use log::LevelFilter;

use crate::commands;

/// sovabids - Map loosely organized EEG recordings into a BIDS dataset
#[derive(Parser, Debug)]
#[command(name = "sovabids")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply rules to a source and write the mapping file
    Apply(commands::apply::ApplyArgs),

    /// List the recordings a source would contribute
    Files(commands::files::FilesArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging()?;

        match self.command {
            Commands::Apply(args) => commands::apply::execute(args),
            Commands::Files(args) => commands::files::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }

    fn init_logging(&self) -> Result<()> {
        let level = parse_log_level(&self.log_level)?;
        let style = parse_color(&self.color)?;
        env_logger::Builder::new()
            .filter_level(level)
            .write_style(style)
            .format_timestamp(None)
            .format_target(false)
            .try_init()?;
        Ok(())
    }
}

fn parse_log_level(level: &str) -> Result<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => bail!("Invalid log level '{}': expected error, warn, info, debug or trace", other),
    }
}

fn parse_color(when: &str) -> Result<WriteStyle> {
    match when.to_ascii_lowercase().as_str() {
        "auto" => Ok(WriteStyle::Auto),
        "always" => Ok(WriteStyle::Always),
        "never" => Ok(WriteStyle::Never),
        other => bail!("Invalid color mode '{}': expected always, never or auto", other),
    }
}
