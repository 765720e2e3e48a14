//! Recording I/O collaborators
//!
//! Reading raw EEG files and writing the standardized output tree are not done
//! by this crate. The pipeline talks to them through three traits:
//!
//! - [`Recording`]: an in-memory recording handle.
//! - [`RecordingReader`]: opens a source file as a [`Recording`].
//! - [`DatasetWriter`]: persists a recording at a [`BidsPath`] and reports
//!   where the data file, JSON sidecar and channel table ended up.
//!
//! Dry mode never needs any of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::layout::BidsPath;

/// Channel kinds a recording understands, addressed by their BIDS labels in
/// the rules (`channels.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelType {
    Eeg,
    Eog,
    Ecg,
    Emg,
    Misc,
    Stim,
    Ecog,
    Seeg,
    Dbs,
    Resp,
    Gsr,
    Temperature,
}

impl ChannelType {
    /// Translate a BIDS channel-type label. Unknown labels yield `None`.
    pub fn from_bids_label(label: &str) -> Option<Self> {
        let channel_type = match label.trim().to_ascii_uppercase().as_str() {
            "EEG" => ChannelType::Eeg,
            "EOG" | "VEOG" | "HEOG" => ChannelType::Eog,
            "ECG" => ChannelType::Ecg,
            "EMG" => ChannelType::Emg,
            "MISC" => ChannelType::Misc,
            "TRIG" => ChannelType::Stim,
            "ECOG" => ChannelType::Ecog,
            "SEEG" => ChannelType::Seeg,
            "DBS" => ChannelType::Dbs,
            "RESP" => ChannelType::Resp,
            "GSR" => ChannelType::Gsr,
            "TEMP" => ChannelType::Temperature,
            _ => return None,
        };
        Some(channel_type)
    }

    /// Lower-case name of the type, as recording libraries spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Eeg => "eeg",
            ChannelType::Eog => "eog",
            ChannelType::Ecg => "ecg",
            ChannelType::Emg => "emg",
            ChannelType::Misc => "misc",
            ChannelType::Stim => "stim",
            ChannelType::Ecog => "ecog",
            ChannelType::Seeg => "seeg",
            ChannelType::Dbs => "dbs",
            ChannelType::Resp => "resp",
            ChannelType::Gsr => "gsr",
            ChannelType::Temperature => "temperature",
        }
    }
}

/// An in-memory recording handle.
pub trait Recording {
    /// Channel names in recording order.
    fn channel_names(&self) -> Vec<String>;

    /// Sampling rate in Hz.
    fn sampling_rate(&self) -> f64;

    /// Index of the last sample.
    fn last_sample(&self) -> u64;

    /// Duration in seconds.
    fn duration(&self) -> f64 {
        self.last_sample() as f64 / self.sampling_rate()
    }

    /// Rename channels; names missing from the recording are an error.
    fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) -> Result<()>;

    /// Override channel types.
    fn set_channel_types(&mut self, types: &BTreeMap<String, ChannelType>) -> Result<()>;

    /// Set the power-line frequency in Hz.
    fn set_line_frequency(&mut self, hz: f64);

    /// Keep only the data up to `tmax` seconds.
    fn crop(&mut self, tmax: f64) -> Result<()>;
}

/// Opens source files as recordings.
pub trait RecordingReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Box<dyn Recording>>;
}

/// Format the writer should persist the data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Whatever format the source came in (full conversion).
    Native,
    /// BrainVision, used for the small preview sample.
    BrainVision,
}

/// Files produced by a [`DatasetWriter`] for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    /// The data (or header) file of the recording.
    pub data: PathBuf,
    /// The JSON sidecar.
    pub sidecar: PathBuf,
    /// The channel table.
    pub channels: PathBuf,
}

/// Persists recordings in the standardized layout.
pub trait DatasetWriter: Send + Sync {
    fn write(&self, recording: &dyn Recording, target: &BidsPath, format: OutputFormat) -> Result<WrittenFiles>;
}
