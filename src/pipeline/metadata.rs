//! Metadata staging
//!
//! Reads the `sidecar` and `channels` sections of a merged rule document once,
//! so the same values can be applied to the in-memory recording and to the
//! files the dataset writer produced.

use log::debug;
use serde_json::{Map as JsonMap, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::recording::{ChannelType, Recording};
use crate::rules::{is_null_like, CHANNELS, SIDECAR};

/// Sidecar key that doubles as the recording's line frequency.
pub const POWER_LINE_FREQUENCY: &str = "PowerLineFrequency";

/// Values staged from a merged rule document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedMetadata {
    /// `sidecar.PowerLineFrequency`, when set to a number.
    pub line_frequency: Option<f64>,
    /// Sidecar entries whose value is not null-like.
    pub sidecar: JsonMap<String, JsonValue>,
    /// `channels.name`: old name to new name.
    pub renames: BTreeMap<String, String>,
    /// `channels.type`: channel name to BIDS label, as written in the rules.
    pub channel_labels: BTreeMap<String, String>,
}

impl StagedMetadata {
    /// Stage the metadata of `rules`.
    pub fn from_rules(rules: &YamlValue) -> Result<Self> {
        let mut staged = StagedMetadata::default();

        if let Some(sidecar) = rules.get(SIDECAR).and_then(YamlValue::as_mapping) {
            for (key, value) in sidecar {
                if is_null_like(value) {
                    continue;
                }
                let key = scalar_text(key).ok_or_else(|| Error::RuleParse {
                    message: format!("Sidecar keys must be strings, found {:?}", key),
                    hint: None,
                })?;
                if key == POWER_LINE_FREQUENCY {
                    staged.line_frequency = number(value);
                }
                staged.sidecar.insert(key, serde_json::to_value(value)?);
            }
        }

        if let Some(channels) = rules.get(CHANNELS) {
            staged.renames = string_map(channels.get("name"), "channels.name")?;
            staged.channel_labels = string_map(channels.get("type"), "channels.type")?;
        }

        Ok(staged)
    }

    /// Channel types the recording understands; unknown labels are left out.
    pub fn channel_types(&self) -> BTreeMap<String, ChannelType> {
        self.channel_labels
            .iter()
            .filter_map(|(channel, label)| match ChannelType::from_bids_label(label) {
                Some(channel_type) => Some((channel.clone(), channel_type)),
                None => {
                    debug!("Channel type '{}' of '{}' is only written to the channel table", label, channel);
                    None
                }
            })
            .collect()
    }

    /// Apply line frequency, renames and channel types, in that order.
    pub fn apply(&self, recording: &mut dyn Recording) -> Result<()> {
        if let Some(hz) = self.line_frequency {
            recording.set_line_frequency(hz);
        }
        if !self.renames.is_empty() {
            recording.rename_channels(&self.renames)?;
        }
        let types = self.channel_types();
        if !types.is_empty() {
            recording.set_channel_types(&types)?;
        }
        Ok(())
    }
}

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(value: &YamlValue) -> Option<f64> {
    match value {
        YamlValue::Number(n) => n.as_f64(),
        YamlValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_map(section: Option<&YamlValue>, name: &str) -> Result<BTreeMap<String, String>> {
    let map = match section {
        None | Some(YamlValue::Null) => return Ok(BTreeMap::new()),
        Some(YamlValue::Mapping(map)) => map,
        Some(other) => {
            return Err(Error::RuleParse {
                message: format!(
                    "'{}' must be a mapping, found {}",
                    name,
                    crate::merge::yaml::yaml_type_name(other)
                ),
                hint: None,
            })
        }
    };

    map.iter()
        .map(|(key, value)| match (scalar_text(key), scalar_text(value)) {
            (Some(key), Some(value)) => Ok((key, value)),
            _ => Err(Error::RuleParse {
                message: format!("'{}' entries must map names to names", name),
                hint: Some(format!("e.g. '{}: {{\"1\": ECG_CHAN}}'", name)),
            }),
        })
        .collect()
}
