//! Files command implementation
//!
//! Lists the recordings `apply` would map, one per line, honoring the
//! `non-bids.eeg_extension` of the rules and any `--exclude` globs.

use anyhow::{Context, Result};
use clap::Args;
use serde_yaml::{Mapping, Value as YamlValue};
use std::path::PathBuf;

use sovabids::rules::{get_files, load_rules, path_to_string};

/// Arguments for the files command
#[derive(Args, Debug)]
pub struct FilesArgs {
    /// Directory to scan
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Rules file whose eeg_extension filters the listing
    #[arg(short, long, value_name = "PATH", env = "SOVABIDS_RULES")]
    pub rules: Option<PathBuf>,

    /// Glob (relative to SOURCE) of files to skip; may be repeated
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,
}

/// Execute the files command
pub fn execute(args: FilesArgs) -> Result<()> {
    let rules = match &args.rules {
        Some(path) => load_rules(path).with_context(|| format!("Failed to load rules from '{}'", path.display()))?,
        None => YamlValue::Mapping(Mapping::new()),
    };

    let files = get_files(&args.source, &rules, &args.exclude)
        .with_context(|| format!("Failed to list files under '{}'", args.source.display()))?;
    for file in &files {
        println!("{}", path_to_string(file));
    }
    log::info!("{} file(s) found", files.len());
    Ok(())
}
