//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a fake recording backend (reader, recording and
//! dataset writer), rule snippets, and a temporary-directory fixture.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_recording("sub-01/ses-1/rest.vhdr");
//! let builder = MappingBuilder::new().with_io(FakeReader::default(), FakeWriter::default());
//! ```

use assert_fs::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sovabids::error::{Error, Result};
use sovabids::layout::BidsPath;
use sovabids::recording::{ChannelType, DatasetWriter, OutputFormat, Recording, RecordingReader, WrittenFiles};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::rules;
    #[allow(unused_imports)]
    pub use super::{FakeReader, FakeWriter, TestFixture};
}

/// Rule documents used across tests.
#[allow(dead_code)]
pub mod rules {
    /// Placeholder path analysis over `sub-X/ses-Y/<anything>.vhdr`.
    pub const PLACEHOLDER: &str = r#"
entities:
  task: resting
sidecar:
  PowerLineFrequency: 50
  EEGReference: FCz
  SoftwareFilters: n/a
channels:
  name:
    "1": ECG_CHAN
  type:
    ECG_CHAN: ECG
non-bids:
  eeg_extension: .vhdr
  path_analysis:
    pattern: sub-%entities.subject%/ses-%entities.session%/%ignore%.vhdr
dataset_description:
  Name: Test dataset
"#;

    /// Rules without an `entities` section.
    pub const NO_ENTITIES: &str = r#"
sidecar:
  EEGReference: FCz
"#;
}

/// An in-memory recording.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeRecording {
    pub channels: Vec<String>,
    pub types: BTreeMap<String, ChannelType>,
    pub sampling_rate: f64,
    pub last_sample: u64,
    pub line_frequency: Option<f64>,
    pub cropped_to: Option<f64>,
}

impl FakeRecording {
    pub fn new(channels: &[&str], sampling_rate: f64, last_sample: u64) -> Self {
        Self {
            channels: channels.iter().map(|c| c.to_string()).collect(),
            types: BTreeMap::new(),
            sampling_rate,
            last_sample,
            line_frequency: None,
            cropped_to: None,
        }
    }
}

impl Recording for FakeRecording {
    fn channel_names(&self) -> Vec<String> {
        self.channels.clone()
    }

    fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    fn last_sample(&self) -> u64 {
        self.last_sample
    }

    fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) -> Result<()> {
        for (old, new) in mapping {
            let channel = self
                .channels
                .iter_mut()
                .find(|c| c.as_str() == old.as_str())
                .ok_or_else(|| Error::Recording {
                    path: PathBuf::from("<memory>"),
                    message: format!("no channel named '{}'", old),
                })?;
            *channel = new.clone();
        }
        Ok(())
    }

    fn set_channel_types(&mut self, types: &BTreeMap<String, ChannelType>) -> Result<()> {
        self.types.extend(types.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }

    fn set_line_frequency(&mut self, hz: f64) {
        self.line_frequency = Some(hz);
    }

    fn crop(&mut self, tmax: f64) -> Result<()> {
        self.cropped_to = Some(tmax);
        self.last_sample = (tmax * self.sampling_rate).round() as u64;
        Ok(())
    }
}

/// Reads every existing file as the same fake recording.
#[derive(Debug, Clone)]
pub struct FakeReader {
    pub template: FakeRecording,
}

impl Default for FakeReader {
    fn default() -> Self {
        Self {
            template: FakeRecording::new(&["1", "Fp1", "Fp2"], 250.0, 2500),
        }
    }
}

impl RecordingReader for FakeReader {
    fn read(&self, path: &Path) -> Result<Box<dyn Recording>> {
        if !path.is_file() {
            return Err(Error::Recording {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }
        Ok(Box::new(self.template.clone()))
    }
}

/// Writes a data file, a JSON sidecar and a channel table the way a real
/// dataset writer lays them out.
#[derive(Debug, Clone, Default)]
pub struct FakeWriter {
    /// Write an unparseable sidecar, making the sidecar overlay fail.
    pub corrupt_sidecar: bool,
    /// Formats requested so far.
    pub formats: Arc<Mutex<Vec<OutputFormat>>>,
}

impl DatasetWriter for FakeWriter {
    fn write(&self, recording: &dyn Recording, target: &BidsPath, format: OutputFormat) -> Result<WrittenFiles> {
        if let Ok(mut formats) = self.formats.lock() {
            formats.push(format);
        }
        let data = match format {
            OutputFormat::Native => target.fpath(),
            OutputFormat::BrainVision => target.with_extension(".vhdr").fpath(),
        };
        let sidecar = target.sidecar_path();
        let channels = target.channels_path();
        fs::create_dir_all(target.directory())?;

        fs::write(&data, format!("samples: {}\n", recording.last_sample()))?;
        if self.corrupt_sidecar {
            fs::write(&sidecar, "{not json")?;
        } else {
            let content = json!({
                "TaskName": target.entity("task").unwrap_or("n/a"),
                "SamplingFrequency": recording.sampling_rate(),
                "PowerLineFrequency": "n/a",
            });
            fs::write(&sidecar, serde_json::to_string_pretty(&content)?)?;
        }

        let mut table = String::from("name\ttype\tunits\n");
        for channel in recording.channel_names() {
            table.push_str(&format!("{}\tEEG\tµV\n", channel));
        }
        fs::write(&channels, table)?;

        Ok(WrittenFiles {
            data,
            sidecar,
            channels,
        })
    }
}

/// A temporary directory with a source tree, an output root and a rules file.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add an (empty) recording under the source directory.
    pub fn with_recording(self, relative: &str) -> Self {
        self.temp_dir
            .child("raw")
            .child(relative)
            .write_str("")
            .expect("Failed to write recording");
        self
    }

    /// Write `rules.yml` with the given content.
    pub fn with_rules(self, content: &str) -> Self {
        self.temp_dir
            .child("rules.yml")
            .write_str(content)
            .expect("Failed to write rules file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Source directory holding the recordings.
    pub fn source(&self) -> PathBuf {
        self.path().join("raw")
    }

    /// Output root of the BIDS dataset.
    pub fn bids(&self) -> PathBuf {
        self.path().join("bids")
    }

    /// Path of the rules file.
    pub fn rules_path(&self) -> PathBuf {
        self.path().join("rules.yml")
    }

    /// Every file and directory under `root`, relative and sorted.
    pub fn tree(&self, root: &Path) -> Vec<String> {
        if !root.exists() {
            return Vec::new();
        }
        let mut entries: Vec<String> = walkdir::WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        entries.sort();
        entries
    }

    /// Create a command for the sovabids binary running in this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sovabids");
        cmd.current_dir(self.path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a YAML snippet.
#[allow(dead_code)]
pub fn yaml(content: &str) -> serde_yaml::Value {
    serde_yaml::from_str(content).expect("invalid YAML in test")
}
