//! Post-write overlays
//!
//! Some rule values are easier to set in the files the dataset writer produced
//! than on the recording itself. After a write (full or preview) this module:
//!
//! 1. updates the JSON sidecar with the non-null sidecar rules and the
//!    duration of the uncropped recording;
//! 2. overwrites the `type` column of the channel table for every channel
//!    named in `channels.type`;
//! 3. deep merges `dataset_description` into `<root>/dataset_description.json`,
//!    creating the file when it does not exist yet.
//!
//! Each step returns the textual snapshot the preview document shows.

use log::debug;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::Path;

use crate::defaults::DATASET_DESCRIPTION_FILE;
use crate::error::{Error, Result};
use crate::merge::merge_into;
use crate::pipeline::metadata::StagedMetadata;
use crate::recording::WrittenFiles;
use crate::rules::is_null_like;

/// Sidecar key holding the recording length in seconds.
pub const RECORDING_DURATION: &str = "RecordingDuration";

/// Snapshots of the overlaid files.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshots {
    /// Sidecar JSON with newlines removed.
    pub sidecar: String,
    /// Channel table as column name to comma-joined values.
    pub channels: Mapping,
    /// Dataset description JSON with newlines removed; empty when absent.
    pub dataset_description: String,
}

/// Run all overlays on the files of one written recording.
pub fn apply_overlays(
    written: &WrittenFiles,
    metadata: &StagedMetadata,
    dataset_description: &YamlValue,
    root: &Path,
    duration: f64,
) -> Result<OverlaySnapshots> {
    let sidecar = update_sidecar(&written.sidecar, &metadata.sidecar, duration)?;
    let channels = update_channels(&written.channels, &metadata.channel_labels)?;
    let dataset_description = update_dataset_description(root, dataset_description)?;
    Ok(OverlaySnapshots {
        sidecar,
        channels,
        dataset_description,
    })
}

/// Update the sidecar JSON object at `path` and return its snapshot.
pub fn update_sidecar(path: &Path, entries: &JsonMap<String, JsonValue>, duration: f64) -> Result<String> {
    let mut sidecar = match read_json(path)? {
        JsonValue::Object(object) => object,
        _ => {
            return Err(Error::Filesystem {
                message: format!("Sidecar '{}' is not a JSON object", path.display()),
            })
        }
    };

    for (key, value) in entries {
        sidecar.insert(key.clone(), value.clone());
    }
    sidecar.insert(RECORDING_DURATION.to_string(), JsonValue::from(duration));

    let content = write_json(path, &JsonValue::Object(sidecar))?;
    Ok(flatten(&content))
}

/// Overwrite channel types in the table at `path` and return its columns.
///
/// Rows are matched on the `name` column. Channels named in `labels` but
/// missing from the table are ignored.
pub fn update_channels(path: &Path, labels: &std::collections::BTreeMap<String, String>) -> Result<Mapping> {
    let content = fs::read_to_string(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to read channel table '{}': {}", path.display(), e),
    })?;
    let mut lines = content.lines().filter(|line| !line.is_empty());
    let header: Vec<String> = match lines.next() {
        Some(line) => line.split('\t').map(str::to_string).collect(),
        None => {
            return Err(Error::Filesystem {
                message: format!("Channel table '{}' is empty", path.display()),
            })
        }
    };
    let mut rows: Vec<Vec<String>> = lines
        .map(|line| {
            let mut cells: Vec<String> = line.split('\t').map(str::to_string).collect();
            cells.resize(header.len(), String::new());
            cells
        })
        .collect();

    if !labels.is_empty() {
        let column = |name: &str| {
            header.iter().position(|h| h == name).ok_or_else(|| Error::Filesystem {
                message: format!("Channel table '{}' has no '{}' column", path.display(), name),
            })
        };
        let name_col = column("name")?;
        let type_col = column("type")?;

        let mut changed = false;
        for row in &mut rows {
            if let Some(label) = labels.get(&row[name_col]) {
                if row[type_col] != *label {
                    row[type_col] = label.clone();
                    changed = true;
                }
            }
        }

        if changed {
            let mut table = header.join("\t");
            table.push('\n');
            for row in &rows {
                table.push_str(&row.join("\t"));
                table.push('\n');
            }
            fs::write(path, table).map_err(|e| Error::Filesystem {
                message: format!("Failed to write channel table '{}': {}", path.display(), e),
            })?;
            debug!("Updated channel types in '{}'", path.display());
        }
    }

    let mut columns = Mapping::new();
    for (index, name) in header.iter().enumerate() {
        let values: Vec<&str> = rows.iter().map(|row| row[index].as_str()).collect();
        columns.insert(YamlValue::String(name.clone()), YamlValue::String(values.join(",")));
    }
    Ok(columns)
}

/// Deep merge `description` into the dataset description of `root`.
///
/// The file is created when missing and `description` has content; it is
/// only rewritten when the merge changes it. Returns the snapshot, or an
/// empty string when there is no file.
pub fn update_dataset_description(root: &Path, description: &YamlValue) -> Result<String> {
    let path = root.join(DATASET_DESCRIPTION_FILE);
    let has_rules = !is_null_like(description);

    let existing = if path.is_file() {
        Some(read_json(&path)?)
    } else {
        None
    };

    let content = match (existing, has_rules) {
        (None, false) => return Ok(String::new()),
        (Some(current), false) => serialize_json(&current)?,
        (current, true) => {
            let before = current.unwrap_or_else(|| JsonValue::Object(JsonMap::new()));
            let mut merged = serde_yaml::to_value(&before)?;
            merge_into(&mut merged, description)?;
            let after = serde_json::to_value(&merged)?;
            if after != before || !path.is_file() {
                write_json(&path, &after)?
            } else {
                serialize_json(&before)?
            }
        }
    };
    Ok(flatten(&content))
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let content = fs::read_to_string(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to read '{}': {}", path.display(), e),
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Pretty-print with a four-space indent and a trailing newline.
fn serialize_json(value: &JsonValue) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    String::from_utf8(buffer).map_err(|e| Error::Filesystem {
        message: format!("Serialized JSON is not UTF-8: {}", e),
    })
}

fn write_json(path: &Path, value: &JsonValue) -> Result<String> {
    let content = serialize_json(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }
    fs::write(path, &content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write '{}': {}", path.display(), e),
    })?;
    Ok(content)
}

fn flatten(content: &str) -> String {
    content.replace('\n', "")
}
