//! Apply command implementation
//!
//! Maps every recording of a source directory (dry mode, nothing is
//! converted) and writes the mapping file:
//!
//! 1. Load the rules file
//! 2. Discover the recordings (extension filter, `--exclude` globs)
//! 3. Resolve one mapping record per file
//! 4. Write `General` + `Individual` to the mapping file

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use sovabids::aggregate::MappingAggregator;
use sovabids::rules::{RulesSource, SourcePaths};

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Directory (or single file) holding the source recordings
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Root of the BIDS dataset the records point into
    #[arg(value_name = "BIDS_PATH")]
    pub bids_path: PathBuf,

    /// Rules file (YAML)
    #[arg(value_name = "RULES")]
    pub rules: PathBuf,

    /// Mapping file to write (defaults to BIDS_PATH/code/sovabids/mappings.yml)
    #[arg(short, long, value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Glob (relative to SOURCE) of files to skip; may be repeated
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Stop at the first file that cannot be mapped
    #[arg(long)]
    pub strict: bool,

    /// Map files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the apply command
pub fn execute(args: ApplyArgs) -> Result<()> {
    let start_time = Instant::now();

    if !args.rules.is_file() {
        anyhow::bail!("Rules file not found: {}", args.rules.display());
    }

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        create_progress_bar()?
    };
    let bar = progress.clone();

    let aggregator = MappingAggregator::default()
        .strict(args.strict)
        .parallel(args.parallel)
        .exclude(args.exclude.clone())
        .on_progress(move |_, total, file| {
            bar.set_length(total as u64);
            bar.set_message(file.display().to_string());
            bar.inc(1);
        });

    let result = aggregator.run(
        &SourcePaths::Path(args.source.clone()),
        &args.bids_path,
        RulesSource::File(&args.rules),
        args.mapping.as_deref(),
    );
    progress.finish_and_clear();
    let report = result.with_context(|| format!("Failed to apply rules to '{}'", args.source.display()))?;

    if !args.quiet {
        println!(
            "Mapped {} file(s) in {:.2}s",
            report.mapping.individual.len(),
            start_time.elapsed().as_secs_f64()
        );
        for failure in &report.failures {
            println!("  skipped {} [{}]: {}", failure.file.display(), failure.kind, failure.message);
        }
        println!("Mapping file: {}", report.mapping_path.display());
    }

    Ok(())
}

fn create_progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::default_bar().template("{bar:30.green} {pos}/{len} {wide_msg}")?);
    Ok(bar)
}
