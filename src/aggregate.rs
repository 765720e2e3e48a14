//! # Mapping Aggregation
//!
//! Runs the per-file pipeline (always in dry mode) over every recording of a
//! source and persists the result as a mapping file:
//!
//! ```yaml
//! General:            # the rules, plus IO.source / IO.target
//!   entities: {task: resting}
//!   IO: {source: data/raw, target: data/bids}
//! Individual:         # one mapping record per file, in input order
//!   - entities: {subject: '01', task: resting}
//!     IO: {source: data/raw/sub-01.vhdr, target: data/bids/sub-01/eeg/sub-01_task-resting_eeg.vhdr}
//! ```
//!
//! Files that fail are logged and reported in [`ApplyReport::failures`]; the
//! batch carries on unless the aggregator is strict.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults::{default_mapping_dir, MAPPING_FILE_NAME};
use crate::error::{Error, Result};
use crate::merge::yaml::yaml_type_name;
use crate::pipeline::{MappingBuilder, Mode};
use crate::rules::{path_to_string, RulesSource, SourcePaths, IO};

/// A persisted mapping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingFile {
    /// The rules the records were built from, with `IO.source`/`IO.target`.
    #[serde(rename = "General")]
    pub general: YamlValue,
    /// One mapping record per successfully mapped file.
    #[serde(rename = "Individual")]
    pub individual: Vec<YamlValue>,
}

impl MappingFile {
    /// Read a mapping file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Filesystem {
            message: format!("Failed to read mapping file '{}': {}", path.display(), e),
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write the mapping file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
                message: format!("Failed to create directory '{}': {}", parent.display(), e),
            })?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).map_err(|e| Error::Filesystem {
            message: format!("Failed to write mapping file '{}': {}", path.display(), e),
        })
    }
}

/// A file that could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: PathBuf,
    /// Short error name, see [`Error::kind`].
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of [`MappingAggregator::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub mapping: MappingFile,
    /// Where the mapping file was written.
    pub mapping_path: PathBuf,
    pub failures: Vec<FileFailure>,
}

type ProgressFn = dyn Fn(usize, usize, &Path) + Send + Sync;

/// Maps every file of a source and writes the mapping file.
pub struct MappingAggregator {
    builder: MappingBuilder,
    strict: bool,
    parallel: bool,
    exclude: Vec<String>,
    progress: Option<Box<ProgressFn>>,
}

impl Default for MappingAggregator {
    fn default() -> Self {
        Self::new(MappingBuilder::new())
    }
}

impl MappingAggregator {
    pub fn new(builder: MappingBuilder) -> Self {
        Self {
            builder,
            strict: false,
            parallel: false,
            exclude: Vec::new(),
            progress: None,
        }
    }

    /// Abort on the first file that fails instead of skipping it.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Map files on the rayon thread pool. Record order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Glob patterns (relative to the source directory) of files to skip.
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Called with `(index, total, file)` before each file is mapped.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &Path) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Map the files of `source` with `rules` and persist the mapping file.
    ///
    /// # Errors
    ///
    /// - `SourcePathType` for an empty file list.
    /// - Rule loading and file discovery errors.
    /// - In strict mode, the first per-file error.
    /// - Failure to write the mapping file.
    pub fn run(
        &self,
        source: &SourcePaths,
        output_root: &Path,
        rules: RulesSource<'_>,
        mapping_path: Option<&Path>,
    ) -> Result<ApplyReport> {
        let rules = rules.load()?;
        let files = source.resolve(&rules, &self.exclude)?;
        debug!("Mapping {} file(s)", files.len());

        let outcomes = self.map_files(&files, &rules, output_root)?;

        let mut individual = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        for (file, outcome) in files.iter().zip(outcomes) {
            match outcome {
                Ok(record) => individual.push(record),
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    warn!("Skipping '{}': {}", file.display(), e);
                    failures.push(FileFailure {
                        file: file.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut general = match rules {
            YamlValue::Mapping(map) => map,
            other => {
                return Err(Error::RuleParse {
                    message: format!("Rules must be a mapping, found {}", yaml_type_name(&other)),
                    hint: None,
                })
            }
        };
        let mut io = Mapping::new();
        io.insert("source".into(), source.to_value());
        io.insert("target".into(), path_to_string(output_root).into());
        general.insert(IO.into(), YamlValue::Mapping(io));

        let mapping = MappingFile {
            general: YamlValue::Mapping(general),
            individual,
        };
        let mapping_path = resolve_mapping_path(output_root, mapping_path);
        mapping.save(&mapping_path)?;
        info!("Mapping file written to '{}'", mapping_path.display());

        Ok(ApplyReport {
            mapping,
            mapping_path,
            failures,
        })
    }

    fn map_files(&self, files: &[PathBuf], rules: &YamlValue, output_root: &Path) -> Result<Vec<Result<YamlValue>>> {
        let total = files.len();
        let map_one = |index: usize, file: &PathBuf| {
            if let Some(progress) = &self.progress {
                progress(index, total, file);
            }
            self.builder
                .build(file, rules, output_root, Mode::Dry)
                .map(|mapping| mapping.record)
        };

        if self.parallel {
            return Ok(files
                .par_iter()
                .enumerate()
                .map(|(index, file)| map_one(index, file))
                .collect());
        }

        let mut outcomes = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            match map_one(index, file) {
                Err(e) if self.strict => return Err(e),
                outcome => outcomes.push(outcome),
            }
        }
        Ok(outcomes)
    }
}

/// Where the mapping file goes.
///
/// No path (or an empty one) means `<output_root>/code/sovabids/mappings.yml`.
/// A path ending in a separator names a directory that receives
/// `mappings.yml`; a bare file name is placed in the default directory.
pub fn resolve_mapping_path(output_root: &Path, requested: Option<&Path>) -> PathBuf {
    let requested = match requested.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => path,
        None => return default_mapping_dir(output_root).join(MAPPING_FILE_NAME),
    };

    let text = requested.to_string_lossy();
    if text.ends_with('/') || text.ends_with('\\') {
        return requested.join(MAPPING_FILE_NAME);
    }
    match requested.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => requested.to_path_buf(),
        _ => default_mapping_dir(output_root).join(requested),
    }
}
