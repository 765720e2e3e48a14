//! # Rule Documents
//!
//! A rule document is a nested YAML mapping describing how to derive BIDS
//! entities and metadata for one or more recordings. The recognized top-level
//! sections are:
//!
//! ```yaml
//! entities:            # BIDS entities (subject, session, task, run, ...)
//!   task: resting
//! sidecar:             # keys injected into the recording's JSON sidecar
//!   PowerLineFrequency: 50
//!   EEGReference: FCz
//! channels:
//!   name: {"1": ECG_CHAN}      # channel renames
//!   type: {ECG_CHAN: ECG}      # BIDS channel types
//! non-bids:
//!   eeg_extension: .vhdr       # string or list
//!   path_analysis:
//!     pattern: sub-%entities.subject%/%entities.task%.vhdr
//!   code_execution: [my_hook]  # names of registered hooks
//! dataset_description:
//!   Name: My dataset
//! ```
//!
//! Documents stay untyped (`serde_yaml::Value`) so that layers can be deep
//! merged key by key; this module provides typed views on the sections the
//! engine interprets, plus loading and file discovery.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::defaults::{DEFAULT_ENCLOSER, DEFAULT_MATCHER, SUPPORTED_EXTENSIONS};
use crate::error::{Error, Result};

/// Section holding the BIDS entities.
pub const ENTITIES: &str = "entities";
/// Section holding sidecar metadata.
pub const SIDECAR: &str = "sidecar";
/// Section holding channel renames and types.
pub const CHANNELS: &str = "channels";
/// Section holding options that are not part of BIDS itself.
pub const NON_BIDS: &str = "non-bids";
/// Section holding the dataset-level description.
pub const DATASET_DESCRIPTION: &str = "dataset_description";
/// Bookkeeping section added to mapping records.
pub const IO: &str = "IO";

/// A value that may be written either as a single item or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item, e.g. `fields: entities.subject`
    One(T),
    /// A list of items, e.g. `fields: [ignore, entities.subject]`
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// The `non-bids.path_analysis` section.
///
/// The presence of `fields` selects regex mode; without it the pattern is read
/// in placeholder notation using `encloser` and `matcher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAnalysis {
    /// A regex, or a placeholder pattern such as `sub-%entities.subject%.vhdr`.
    #[serde(default)]
    pub pattern: String,
    /// Field names, one per capture group, in order (regex mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<OneOrMany<String>>,
    /// Delimiter around placeholder names.
    #[serde(default = "default_encloser")]
    pub encloser: String,
    /// Regex each placeholder is replaced with.
    #[serde(default = "default_matcher")]
    pub matcher: String,
}

fn default_encloser() -> String {
    DEFAULT_ENCLOSER.to_string()
}

fn default_matcher() -> String {
    DEFAULT_MATCHER.to_string()
}

impl PathAnalysis {
    /// A regex-mode analysis.
    pub fn regex(pattern: &str, fields: &[&str]) -> Self {
        Self {
            pattern: pattern.to_string(),
            fields: Some(OneOrMany::Many(fields.iter().map(|f| f.to_string()).collect())),
            encloser: default_encloser(),
            matcher: default_matcher(),
        }
    }

    /// A placeholder-mode analysis with the default encloser and matcher.
    pub fn placeholder(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            fields: None,
            encloser: default_encloser(),
            matcher: default_matcher(),
        }
    }
}

/// Where the rules come from: a YAML file, or an already parsed document.
#[derive(Debug, Clone, Copy)]
pub enum RulesSource<'a> {
    /// Path to a YAML rules file.
    File(&'a Path),
    /// A parsed document; it is cloned, never modified.
    Document(&'a YamlValue),
}

impl RulesSource<'_> {
    /// Load the rules as an owned document.
    ///
    /// Documents are checked like files: null becomes an empty mapping and
    /// any other non-mapping is rejected.
    pub fn load(self) -> Result<YamlValue> {
        match self {
            RulesSource::File(path) => load_rules(path),
            RulesSource::Document(document) => validate_rules(document.clone()),
        }
    }
}

/// Read a YAML rules file.
///
/// An empty file is an empty document. Anything other than a mapping at the
/// top level is rejected.
pub fn load_rules(path: &Path) -> Result<YamlValue> {
    let content = fs::read_to_string(path).map_err(|e| Error::RuleParse {
        message: format!("Cannot read rules file '{}': {}", path.display(), e),
        hint: None,
    })?;
    parse_rules(&content)
}

/// Parse a YAML rules document from a string.
pub fn parse_rules(content: &str) -> Result<YamlValue> {
    validate_rules(serde_yaml::from_str(content)?)
}

fn validate_rules(document: YamlValue) -> Result<YamlValue> {
    match document {
        YamlValue::Null => Ok(YamlValue::Mapping(Mapping::new())),
        YamlValue::Mapping(_) => Ok(document),
        other => Err(Error::RuleParse {
            message: format!(
                "Rules must be a mapping at the top level, found {}",
                crate::merge::yaml::yaml_type_name(&other)
            ),
            hint: Some("Start the rules file with a section such as 'entities:'".to_string()),
        }),
    }
}

/// The `non-bids` section, if present.
fn non_bids(rules: &YamlValue) -> Option<&YamlValue> {
    rules.get(NON_BIDS).filter(|v| !v.is_null())
}

/// Typed view of `non-bids.path_analysis`.
pub fn path_analysis(rules: &YamlValue) -> Result<Option<PathAnalysis>> {
    match non_bids(rules).and_then(|nb| nb.get("path_analysis")) {
        None | Some(YamlValue::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::RuleParse {
                message: format!("Invalid 'non-bids.path_analysis': {}", e),
                hint: Some("Expected 'pattern' and optionally 'fields', 'encloser', 'matcher'".to_string()),
            }),
    }
}

/// Hook names listed under `non-bids.code_execution`.
pub fn code_execution(rules: &YamlValue) -> Result<Vec<String>> {
    match non_bids(rules).and_then(|nb| nb.get("code_execution")) {
        None | Some(YamlValue::Null) => Ok(Vec::new()),
        Some(value) => serde_yaml::from_value::<OneOrMany<String>>(value.clone())
            .map(OneOrMany::into_vec)
            .map_err(|e| Error::RuleParse {
                message: format!("Invalid 'non-bids.code_execution': {}", e),
                hint: Some("Use a hook name or a list of hook names".to_string()),
            }),
    }
}

/// Accepted recording extensions, each with a leading dot.
///
/// Falls back to [`SUPPORTED_EXTENSIONS`] when `non-bids.eeg_extension` is
/// absent or unreadable.
pub fn eeg_extensions(rules: &YamlValue) -> Vec<String> {
    let configured = non_bids(rules)
        .and_then(|nb| nb.get("eeg_extension"))
        .and_then(|value| serde_yaml::from_value::<OneOrMany<String>>(value.clone()).ok())
        .map(OneOrMany::into_vec)
        .filter(|exts| !exts.is_empty());

    match configured {
        Some(exts) => exts
            .into_iter()
            .filter(|ext| !ext.is_empty())
            .map(|ext| if ext.starts_with('.') { ext } else { format!(".{}", ext) })
            .collect(),
        None => SUPPORTED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
    }
}

/// Whether a sidecar value counts as "not set".
pub fn is_null_like(value: &YamlValue) -> bool {
    match value {
        YamlValue::Null => true,
        YamlValue::String(s) => s.trim().is_empty() || s.trim().eq_ignore_ascii_case("n/a"),
        YamlValue::Sequence(seq) => seq.is_empty(),
        YamlValue::Mapping(map) => map.is_empty(),
        _ => false,
    }
}

/// Normalize a path string to forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// The recordings to map: a directory to scan, or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePaths {
    /// A directory scanned recursively (a single file is accepted too).
    Path(PathBuf),
    /// An explicit, non-empty list of recording files.
    Files(Vec<PathBuf>),
}

impl SourcePaths {
    /// Build from an explicit list, rejecting an empty one.
    pub fn files(files: Vec<PathBuf>) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::SourcePathType {
                message: "the file list is empty".to_string(),
            });
        }
        Ok(SourcePaths::Files(files))
    }

    /// The document form recorded as `IO.source`.
    pub fn to_value(&self) -> YamlValue {
        match self {
            SourcePaths::Path(path) => YamlValue::String(path_to_string(path)),
            SourcePaths::Files(files) => {
                YamlValue::Sequence(files.iter().map(|f| YamlValue::String(path_to_string(f))).collect())
            }
        }
    }

    /// Expand into the list of files to process.
    ///
    /// Directories are scanned with [`get_files`]; an explicit list is used as
    /// given.
    pub fn resolve(&self, rules: &YamlValue, exclude: &[String]) -> Result<Vec<PathBuf>> {
        match self {
            SourcePaths::Path(path) => get_files(path, rules, exclude),
            SourcePaths::Files(files) if files.is_empty() => Err(Error::SourcePathType {
                message: "the file list is empty".to_string(),
            }),
            SourcePaths::Files(files) => Ok(files.clone()),
        }
    }
}

/// Forward-slash string form of a path.
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Recursively list the recordings under `source`.
///
/// A file is kept when its extension is one of [`eeg_extensions`] and its path
/// relative to `source` matches none of the `exclude` globs. The result is
/// sorted.
pub fn get_files(source: &Path, rules: &YamlValue, exclude: &[String]) -> Result<Vec<PathBuf>> {
    let extensions = eeg_extensions(rules);
    let exclude = exclude
        .iter()
        .map(|pattern| Pattern::new(pattern))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = match path.extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => continue,
        };
        if !extensions.contains(&extension) {
            continue;
        }
        let relative = path_to_string(path.strip_prefix(source).unwrap_or(path));
        if exclude.iter().any(|pattern| pattern.matches(&relative)) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}
