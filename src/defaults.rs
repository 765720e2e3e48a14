//! Default values for sovabids rules and output locations.
//!
//! This module provides centralized defaults used across the library and the
//! CLI, ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};

/// Recording extensions accepted when the rules do not set
/// `non-bids.eeg_extension`.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".set", ".cnt", ".vhdr", ".bdf", ".fif", ".edf"];

/// Default delimiter around placeholder names in a path pattern.
pub const DEFAULT_ENCLOSER: &str = "%";

/// Default regex a placeholder is lowered to.
pub const DEFAULT_MATCHER: &str = "(.+)";

/// File name of the mapping file when none is given.
pub const MAPPING_FILE_NAME: &str = "mappings.yml";

/// Number of leading samples kept when previewing a recording.
pub const PREVIEW_MAX_SAMPLES: u64 = 10;

/// Nesting depth beyond which rule documents are rejected by the merger.
pub const MAX_MERGE_DEPTH: usize = 128;

/// Name of the dataset-level description file at the root of the output.
pub const DATASET_DESCRIPTION_FILE: &str = "dataset_description.json";

/// Returns the directory the mapping file is written to when the caller does
/// not choose one: `<output_root>/code/sovabids`.
pub fn default_mapping_dir(output_root: &Path) -> PathBuf {
    output_root.join("code").join("sovabids")
}
