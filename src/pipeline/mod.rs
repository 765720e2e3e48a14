//! # Per-file Mapping Pipeline
//!
//! [`MappingBuilder::build`] turns one recording plus a merged rule document
//! into a mapping record. Every file goes through the same stages:
//!
//! 1. **Path analysis**: fields extracted from the path (if
//!    `non-bids.path_analysis` is set) are merged over the rules. Extracted
//!    values win; `ignore` is dropped.
//! 2. **Validation**: the result must have an `entities` mapping.
//! 3. **Staging**: sidecar values, line frequency, channel renames and types
//!    are read from the rules; extension hooks run.
//! 4. **Target resolution**: the BIDS path is built from the entities.
//! 5. **Mode dispatch**:
//!    - [`Mode::Dry`] reads nothing and writes nothing.
//!    - [`Mode::Write`] converts the recording through the configured
//!      [`DatasetWriter`] and overlays the rules on the produced files.
//!    - [`Mode::Preview`] writes a cropped sample, captures snapshots of the
//!      produced files and rolls the output tree back.
//!
//! The input rules are never modified; each call works on its own copy.

pub mod metadata;
pub mod overlay;
pub mod preview;

use log::debug;
use serde_yaml::{Mapping, Value as YamlValue};
use std::path::Path;

use crate::defaults::PREVIEW_MAX_SAMPLES;
use crate::error::{Error, Result};
use crate::extract::{extract, strip_ignored};
use crate::hooks::{HookContext, HookRegistry};
use crate::layout::{source_extension, BidsPath};
use crate::merge::merge_into;
use crate::recording::{DatasetWriter, OutputFormat, Recording, RecordingReader, WrittenFiles};
use crate::rules::{code_execution, path_analysis, path_to_string, DATASET_DESCRIPTION, ENTITIES, IO};

use metadata::StagedMetadata;
use overlay::{apply_overlays, OverlaySnapshots};
use preview::ArtifactGuard;

/// How far [`MappingBuilder::build`] goes for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Resolve the mapping only.
    #[default]
    Dry,
    /// Write a small sample, snapshot it, then remove it again.
    Preview,
    /// Convert the recording into the output tree.
    Write,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Dry => "dry",
            Mode::Preview => "preview",
            Mode::Write => "write",
        };
        write!(f, "{}", name)
    }
}

/// Result of mapping one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMapping {
    /// Merged rules plus `IO.source`/`IO.target`, without `dataset_description`.
    pub record: YamlValue,
    /// Preview document (`IO`, `entities`, `dataset_description`, `sidecar`,
    /// `channels`), only in [`Mode::Preview`].
    pub preview: Option<YamlValue>,
}

/// Reader and writer used by preview and write modes.
pub struct RecordingIo {
    pub reader: Box<dyn RecordingReader>,
    pub writer: Box<dyn DatasetWriter>,
}

/// Builds mapping records for single files.
#[derive(Default)]
pub struct MappingBuilder {
    hooks: HookRegistry,
    io: Option<RecordingIo>,
}

impl std::fmt::Debug for MappingBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingBuilder")
            .field("hooks", &self.hooks)
            .field("io", &self.io.is_some())
            .finish()
    }
}

impl MappingBuilder {
    /// A builder without hooks or recording backend (dry mode only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `hooks` for `non-bids.code_execution`.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enable preview and write modes.
    pub fn with_io<R, W>(mut self, reader: R, writer: W) -> Self
    where
        R: RecordingReader + 'static,
        W: DatasetWriter + 'static,
    {
        self.io = Some(RecordingIo {
            reader: Box::new(reader),
            writer: Box::new(writer),
        });
        self
    }

    /// Map `file` with `rules` into the dataset rooted at `output_root`.
    ///
    /// # Errors
    ///
    /// - Extraction errors (`PatternMismatch`, `FieldCountMismatch`,
    ///   `PatternSyntax`, `Regex`) from path analysis.
    /// - `MissingEntities` / `InvalidEntity` when no target can be built.
    /// - `BackendUnavailable` for preview or write without [`with_io`](Self::with_io).
    /// - Reader, writer and overlay failures in preview and write modes. A
    ///   preview rolls the output tree back before returning any of them.
    pub fn build(&self, file: &Path, rules: &YamlValue, output_root: &Path, mode: Mode) -> Result<FileMapping> {
        let source = path_to_string(file);
        let mut rules = resolve_rules(&source, rules)?;

        match rules.get(ENTITIES) {
            Some(YamlValue::Mapping(_)) => {}
            _ => return Err(Error::MissingEntities { file: source }),
        }
        let staged = StagedMetadata::from_rules(&rules)?;
        let commands = code_execution(&rules)?;
        debug!("'{}': rules resolved, mode {}", source, mode);

        if mode == Mode::Dry {
            self.run_hooks(file, &commands, &mut rules, None);
            let target = target_path(&rules, output_root, file)?;
            let record = finalize(rules, &source, &path_to_string(&target.fpath()));
            return Ok(FileMapping { record, preview: None });
        }

        let io = self.io.as_ref().ok_or_else(|| Error::BackendUnavailable {
            mode: mode.to_string(),
        })?;
        let mut recording = io.reader.read(file)?;
        staged.apply(recording.as_mut())?;
        self.run_hooks(file, &commands, &mut rules, Some(recording.as_mut()));

        let target = target_path(&rules, output_root, file)?;
        let overlay_metadata = StagedMetadata::from_rules(&rules)?;
        let description = rules.get(DATASET_DESCRIPTION).cloned().unwrap_or(YamlValue::Null);
        let duration = recording.duration();

        if mode == Mode::Write {
            let written = io.writer.write(recording.as_ref(), &target, OutputFormat::Native)?;
            apply_overlays(&written, &overlay_metadata, &description, output_root, duration)?;
            debug!("'{}' written to '{}'", source, written.data.display());
            let record = finalize(rules, &source, &path_to_string(&written.data));
            return Ok(FileMapping { record, preview: None });
        }

        let max_samples = PREVIEW_MAX_SAMPLES.min(recording.last_sample());
        recording.crop(max_samples as f64 / recording.sampling_rate())?;

        // The writer only touches the target directory and the directories
        // above it, up to the dataset root.
        let mut guard = ArtifactGuard::snapshot(output_root)?;
        for dir in target.directory().ancestors().take_while(|dir| dir.starts_with(output_root)) {
            guard.preserve_dir(dir)?;
        }
        let outcome = write_sample(
            io.writer.as_ref(),
            recording.as_ref(),
            &target,
            &overlay_metadata,
            &description,
            output_root,
            duration,
        );
        guard.rollback();
        let (written, snapshots) = outcome?;

        let record = finalize(rules, &source, &path_to_string(&written.data));
        let preview = preview_document(&record, snapshots);
        debug!("'{}': preview generated and cleaned", source);
        Ok(FileMapping {
            record,
            preview: Some(preview),
        })
    }

    fn run_hooks<'a>(
        &self,
        file: &'a Path,
        commands: &[String],
        rules: &'a mut YamlValue,
        recording: Option<&'a mut dyn Recording>,
    ) {
        if commands.is_empty() {
            return;
        }
        let mut ctx = HookContext { file, rules, recording };
        self.hooks.run(commands, &mut ctx);
    }
}

/// Copy `rules` and merge the fields extracted from `source` over it.
pub fn resolve_rules(source: &str, rules: &YamlValue) -> Result<YamlValue> {
    let mut resolved = match rules {
        YamlValue::Null => YamlValue::Mapping(Mapping::new()),
        other => other.clone(),
    };
    if let Some(analysis) = path_analysis(rules)? {
        let mut extracted = extract(source, &analysis)?;
        strip_ignored(&mut extracted);
        merge_into(&mut resolved, &extracted)?;
    }
    strip_ignored(&mut resolved);
    Ok(resolved)
}

fn target_path(rules: &YamlValue, output_root: &Path, file: &Path) -> Result<BidsPath> {
    let entities = rules.get(ENTITIES).unwrap_or(&YamlValue::Null);
    Ok(BidsPath::from_entities(entities, output_root)?.with_extension(&source_extension(file)))
}

fn write_sample(
    writer: &dyn DatasetWriter,
    recording: &dyn Recording,
    target: &BidsPath,
    metadata: &StagedMetadata,
    description: &YamlValue,
    output_root: &Path,
    duration: f64,
) -> Result<(WrittenFiles, OverlaySnapshots)> {
    let written = writer.write(recording, target, OutputFormat::BrainVision)?;
    let snapshots = apply_overlays(&written, metadata, description, output_root, duration)?;
    Ok((written, snapshots))
}

/// Drop the dataset-level section and record where the file came from and
/// where it goes.
fn finalize(mut rules: YamlValue, source: &str, target: &str) -> YamlValue {
    if let Some(map) = rules.as_mapping_mut() {
        map.remove(DATASET_DESCRIPTION);
        let mut io = Mapping::new();
        io.insert("source".into(), source.into());
        io.insert("target".into(), target.into());
        map.insert(IO.into(), YamlValue::Mapping(io));
    }
    rules
}

fn preview_document(record: &YamlValue, snapshots: OverlaySnapshots) -> YamlValue {
    let mut preview = Mapping::new();
    preview.insert(IO.into(), record.get(IO).cloned().unwrap_or(YamlValue::Null));
    preview.insert(
        ENTITIES.into(),
        record.get(ENTITIES).cloned().unwrap_or(YamlValue::Null),
    );
    preview.insert(DATASET_DESCRIPTION.into(), snapshots.dataset_description.into());
    preview.insert("sidecar".into(), snapshots.sidecar.into());
    preview.insert("channels".into(), YamlValue::Mapping(snapshots.channels));
    YamlValue::Mapping(preview)
}
