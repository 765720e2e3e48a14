//! BIDS target paths
//!
//! Resolves the `entities` section of a rule document into the location of a
//! recording inside a BIDS dataset:
//!
//! ```text
//! <root>/sub-<subject>[/ses-<session>]/<datatype>/sub-<subject>[_ses-<session>][_task-<task>]..._<suffix><extension>
//! ```
//!
//! Only the path arithmetic lives here; writing the files is the job of a
//! [`DatasetWriter`](crate::recording::DatasetWriter).

use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::rules::path_to_string;

/// Supported entities in filename order, with their filename keys.
pub const ENTITY_ORDER: &[(&str, &str)] = &[
    ("subject", "sub"),
    ("session", "ses"),
    ("task", "task"),
    ("acquisition", "acq"),
    ("run", "run"),
    ("processing", "proc"),
    ("recording", "rec"),
    ("space", "space"),
    ("split", "split"),
    ("description", "desc"),
];

/// Datatype (and default suffix) of every recording this engine maps.
pub const EEG_DATATYPE: &str = "eeg";

/// A resolved location inside a BIDS dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsPath {
    root: PathBuf,
    /// `(filename key, value)` pairs in [`ENTITY_ORDER`].
    entities: Vec<(&'static str, String)>,
    datatype: String,
    suffix: String,
    extension: String,
}

impl BidsPath {
    /// Build a path from an `entities` mapping.
    ///
    /// Values may be strings or numbers; null values are treated as absent.
    ///
    /// # Errors
    ///
    /// `Error::InvalidEntity` for an unknown entity name, a missing subject, or
    /// a value that would break the filename (empty, or containing `-`, `_`,
    /// or a path separator).
    pub fn from_entities(entities: &YamlValue, root: &Path) -> Result<Self> {
        let map = entities.as_mapping().ok_or_else(|| Error::InvalidEntity {
            name: "entities".to_string(),
            message: "must be a mapping of entity names to values".to_string(),
        })?;

        for key in map.keys() {
            let name = key
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", key));
            if !ENTITY_ORDER.iter().any(|(entity, _)| *entity == name) {
                return Err(Error::InvalidEntity {
                    name,
                    message: format!(
                        "unknown entity; expected one of {}",
                        ENTITY_ORDER
                            .iter()
                            .map(|(entity, _)| *entity)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                });
            }
        }

        let mut resolved = Vec::new();
        for (name, key) in ENTITY_ORDER {
            let value = match map.get(*name) {
                None | Some(YamlValue::Null) => continue,
                Some(value) => entity_value(name, value)?,
            };
            resolved.push((*key, value));
        }

        if !resolved.iter().any(|(key, _)| *key == "sub") {
            return Err(Error::InvalidEntity {
                name: "subject".to_string(),
                message: "a subject is required to build a BIDS path".to_string(),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            entities: resolved,
            datatype: EEG_DATATYPE.to_string(),
            suffix: EEG_DATATYPE.to_string(),
            extension: String::new(),
        })
    }

    /// Copy with a different suffix and extension, e.g. `channels` + `.tsv`.
    pub fn with_suffix(&self, suffix: &str, extension: &str) -> Self {
        let mut updated = self.clone();
        updated.suffix = suffix.to_string();
        updated.extension = extension.to_string();
        updated
    }

    /// Copy with a different extension.
    pub fn with_extension(&self, extension: &str) -> Self {
        self.with_suffix(&self.suffix, extension)
    }

    /// Value of an entity by its full name (`subject`, `session`, ...).
    pub fn entity(&self, name: &str) -> Option<&str> {
        let key = ENTITY_ORDER.iter().find(|(entity, _)| *entity == name)?.1;
        self.entities
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value.as_str())
    }

    /// File name, e.g. `sub-01_ses-1_task-rest_eeg.vhdr`.
    pub fn basename(&self) -> String {
        let mut parts: Vec<String> = self
            .entities
            .iter()
            .map(|(key, value)| format!("{}-{}", key, value))
            .collect();
        parts.push(self.suffix.clone());
        format!("{}{}", parts.join("_"), self.extension)
    }

    /// Directory holding the file: `<root>/sub-X[/ses-Y]/<datatype>`.
    pub fn directory(&self) -> PathBuf {
        let mut dir = self.root.clone();
        for (key, value) in &self.entities {
            if *key == "sub" || *key == "ses" {
                dir.push(format!("{}-{}", key, value));
            }
        }
        dir.push(&self.datatype);
        dir
    }

    /// Full path of the file.
    pub fn fpath(&self) -> PathBuf {
        self.directory().join(self.basename())
    }

    /// JSON sidecar next to the recording.
    pub fn sidecar_path(&self) -> PathBuf {
        self.with_suffix(EEG_DATATYPE, ".json").fpath()
    }

    /// Channel table next to the recording.
    pub fn channels_path(&self) -> PathBuf {
        self.with_suffix("channels", ".tsv").fpath()
    }
}

impl std::fmt::Display for BidsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", path_to_string(&self.fpath()))
    }
}

fn entity_value(name: &str, value: &YamlValue) -> Result<String> {
    let text = match value {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        other => {
            return Err(Error::InvalidEntity {
                name: name.to_string(),
                message: format!(
                    "expected a string or a number, found {}",
                    crate::merge::yaml::yaml_type_name(other)
                ),
            })
        }
    };

    if text.is_empty() {
        return Err(Error::InvalidEntity {
            name: name.to_string(),
            message: "value is empty".to_string(),
        });
    }
    if let Some(bad) = text.chars().find(|c| matches!(c, '-' | '_' | '/' | '\\')) {
        return Err(Error::InvalidEntity {
            name: name.to_string(),
            message: format!("value '{}' contains the reserved character '{}'", text, bad),
        });
    }
    Ok(text)
}

/// Extension the dataset writer will keep for a source recording.
///
/// Multi-file formats point at their header file: BrainVision `.eeg` data is
/// addressed through `.vhdr`, EEGLAB `.fdt` through `.set` and Nihon Kohden
/// `.dat` through `.lay`.
pub fn source_extension(source: &Path) -> String {
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    match extension.as_str() {
        ".eeg" => ".vhdr".to_string(),
        ".fdt" => ".set".to_string(),
        ".dat" => ".lay".to_string(),
        _ => extension,
    }
}
