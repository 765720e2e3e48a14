//! Deep merge of YAML rule documents
//!
//! Rule documents are layered: a template document, per-dataset overrides and
//! the fields extracted from a file path are merged in order, and the later
//! layer wins wherever two layers disagree.
//!
//! ## Semantics
//!
//! - Mapping meets mapping: keys are merged recursively.
//! - Anything else (scalar, sequence, or a mapping meeting a non-mapping): the
//!   later value replaces the earlier one. Sequences are never concatenated.
//! - Inputs are never modified; [`merge`] clones into a fresh accumulator.
//! - Recursion is bounded by [`MAX_MERGE_DEPTH`] so that caller-supplied
//!   documents cannot exhaust the stack.
//!
//! ## Example
//!
//! ```
//! use sovabids::merge::merge;
//!
//! let base: serde_yaml::Value =
//!     serde_yaml::from_str("entities: {subject: A, session: '1'}").unwrap();
//! let layer: serde_yaml::Value = serde_yaml::from_str("entities: {subject: B}").unwrap();
//!
//! let merged = merge(&[base, layer]).unwrap();
//! assert_eq!(merged["entities"]["subject"], "B");
//! assert_eq!(merged["entities"]["session"], "1");
//! ```

use log::debug;
use serde_yaml::{Mapping, Value as YamlValue};

use super::parse_path;
use crate::defaults::MAX_MERGE_DEPTH;
use crate::error::{Error, Result};

/// Merge an ordered list of documents, later documents taking precedence.
///
/// An empty list yields an empty mapping.
pub fn merge(documents: &[YamlValue]) -> Result<YamlValue> {
    let mut merged = YamlValue::Mapping(Mapping::new());
    for document in documents {
        merge_into(&mut merged, document)?;
    }
    Ok(merged)
}

/// Merge `source` into `target` in place, `source` winning on conflicts.
pub fn merge_into(target: &mut YamlValue, source: &YamlValue) -> Result<()> {
    merge_values(target, source, "", 0)
}

fn merge_values(target: &mut YamlValue, source: &YamlValue, path: &str, depth: usize) -> Result<()> {
    if depth > MAX_MERGE_DEPTH {
        return Err(Error::MergeDepthExceeded {
            path: path.to_string(),
            limit: MAX_MERGE_DEPTH,
        });
    }

    match (target, source) {
        (YamlValue::Mapping(target_map), YamlValue::Mapping(source_map)) => {
            for (key, value) in source_map {
                let key_str = match key {
                    YamlValue::String(s) => s.clone(),
                    other => format!("{:?}", other),
                };
                let new_path = if path.is_empty() {
                    key_str
                } else {
                    format!("{}.{}", path, key_str)
                };

                match target_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value, &new_path, depth + 1)?,
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => {
            if !path.is_empty() {
                debug!(
                    "Replacing value at '{}': {} -> {}",
                    path,
                    yaml_type_name(target),
                    yaml_type_name(source)
                );
            }
            *target = source.clone();
        }
    }

    Ok(())
}

/// Navigate to a key path within a YAML value, creating missing mappings.
///
/// Null values on the way are replaced by empty mappings.
///
/// # Errors
///
/// Returns `Error::RuleParse` if the path runs through a non-mapping value.
pub fn navigate_yaml_value<'a>(value: &'a mut YamlValue, keys: &[&str]) -> Result<&'a mut YamlValue> {
    let mut current = value;
    for key in keys {
        if current.is_null() {
            *current = YamlValue::Mapping(Mapping::new());
        }
        let found = yaml_type_name(current);
        let map = match current.as_mapping_mut() {
            Some(map) => map,
            None => {
                return Err(Error::RuleParse {
                    message: format!(
                        "Expected mapping while navigating to '{}', found {}",
                        key, found
                    ),
                    hint: None,
                })
            }
        };
        current = map
            .entry(YamlValue::String((*key).to_string()))
            .or_insert(YamlValue::Null);
    }

    Ok(current)
}

/// Assign `value` at the dotted `field` path of `document`.
///
/// `set_path(doc, "entities.subject", "01")` turns an empty document into
/// `{entities: {subject: "01"}}`.
pub fn set_path(document: &mut YamlValue, field: &str, value: YamlValue) -> Result<()> {
    let keys = parse_path(field).ok_or_else(|| Error::RuleParse {
        message: format!("Invalid field name '{}'", field),
        hint: Some("Every capture group needs a field such as 'entities.subject'".to_string()),
    })?;
    let slot = navigate_yaml_value(document, &keys)?;
    *slot = value;
    Ok(())
}

/// Get a human-readable type name for a YAML value
pub fn yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "Null",
        YamlValue::Bool(_) => "Bool",
        YamlValue::Number(_) => "Number",
        YamlValue::String(_) => "String",
        YamlValue::Sequence(_) => "Sequence",
        YamlValue::Mapping(_) => "Mapping",
        YamlValue::Tagged(_) => "Tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> YamlValue {
        serde_yaml::from_str(s).unwrap()
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_merge_right_biased_scalar() {
            let merged = merge(&[
                yaml("entities: {subject: A, session: '1'}"),
                yaml("entities: {subject: B}"),
            ])
            .unwrap();
            assert_eq!(merged, yaml("entities: {subject: B, session: '1'}"));
        }

        #[test]
        fn test_merge_empty_list() {
            assert_eq!(merge(&[]).unwrap(), YamlValue::Mapping(Mapping::new()));
        }

        #[test]
        fn test_merge_disjoint_keys_is_union() {
            let merged = merge(&[yaml("sidecar: {EEGReference: Cz}"), yaml("entities: {task: rest}")])
                .unwrap();
            assert_eq!(merged["sidecar"]["EEGReference"], "Cz");
            assert_eq!(merged["entities"]["task"], "rest");
        }

        #[test]
        fn test_merge_sequences_replace() {
            let merged = merge(&[
                yaml("non-bids: {eeg_extension: [.vhdr, .edf]}"),
                yaml("non-bids: {eeg_extension: [.set]}"),
            ])
            .unwrap();
            assert_eq!(merged["non-bids"]["eeg_extension"], yaml("[.set]"));
        }

        #[test]
        fn test_merge_mapping_replaced_by_scalar() {
            let merged = merge(&[yaml("channels: {name: {a: b}}"), yaml("channels: none")]).unwrap();
            assert_eq!(merged["channels"], "none");
        }

        #[test]
        fn test_merge_scalar_replaced_by_mapping() {
            let merged = merge(&[yaml("channels: none"), yaml("channels: {type: {Fp1: EOG}}")]).unwrap();
            assert_eq!(merged["channels"]["type"]["Fp1"], "EOG");
        }

        #[test]
        fn test_merge_three_layers() {
            let merged = merge(&[
                yaml("entities: {subject: A, task: rest}"),
                yaml("entities: {subject: B}"),
                yaml("entities: {subject: C, run: 1}"),
            ])
            .unwrap();
            assert_eq!(merged, yaml("entities: {subject: C, task: rest, run: 1}"));
        }

        #[test]
        fn test_merge_does_not_mutate_inputs() {
            let a = yaml("entities: {subject: A}");
            let b = yaml("entities: {subject: B}");
            let _ = merge(&[a.clone(), b.clone()]).unwrap();
            assert_eq!(a, yaml("entities: {subject: A}"));
            assert_eq!(b, yaml("entities: {subject: B}"));
        }

        #[test]
        fn test_merge_depth_limit() {
            let mut deep = YamlValue::String("leaf".to_string());
            for _ in 0..(MAX_MERGE_DEPTH + 5) {
                let mut map = Mapping::new();
                map.insert(YamlValue::String("k".to_string()), deep);
                deep = YamlValue::Mapping(map);
            }
            let result = merge(&[deep.clone(), deep]);
            assert!(matches!(result, Err(Error::MergeDepthExceeded { .. })));
        }
    }

    mod navigate_yaml_value_tests {
        use super::*;

        #[test]
        fn test_navigate_to_nested_key() {
            let mut value = yaml("foo:\n  bar: 1");
            let target = navigate_yaml_value(&mut value, &["foo", "bar"]).unwrap();
            assert_eq!(target, &YamlValue::Number(1.into()));
        }

        #[test]
        fn test_navigate_creates_missing_path() {
            let mut value = YamlValue::Null;
            let target = navigate_yaml_value(&mut value, &["foo", "bar"]).unwrap();
            assert!(target.is_null());
            assert!(value["foo"].is_mapping());
        }

        #[test]
        fn test_navigate_type_error() {
            let mut value = yaml("foo: 42");
            let result = navigate_yaml_value(&mut value, &["foo", "bar"]);
            assert!(result.unwrap_err().to_string().contains("found Number"));
        }
    }

    mod set_path_tests {
        use super::*;

        #[test]
        fn test_set_path_creates_intermediate_mappings() {
            let mut doc = YamlValue::Mapping(Mapping::new());
            set_path(&mut doc, "entities.subject", "010002".into()).unwrap();
            assert_eq!(doc, yaml("entities: {subject: '010002'}"));
        }

        #[test]
        fn test_set_path_top_level() {
            let mut doc = YamlValue::Mapping(Mapping::new());
            set_path(&mut doc, "ignore", "ub".into()).unwrap();
            assert_eq!(doc["ignore"], "ub");
        }

        #[test]
        fn test_set_path_later_assignment_wins() {
            let mut doc = YamlValue::Mapping(Mapping::new());
            set_path(&mut doc, "entities.subject", "a".into()).unwrap();
            set_path(&mut doc, "entities.subject", "b".into()).unwrap();
            assert_eq!(doc["entities"]["subject"], "b");
        }

        #[test]
        fn test_set_path_empty_field_is_error() {
            let mut doc = YamlValue::Mapping(Mapping::new());
            assert!(set_path(&mut doc, "", "x".into()).is_err());
            assert!(set_path(&mut doc, "entities..run", "x".into()).is_err());
        }

        #[test]
        fn test_set_path_brackets_name_a_mapping_key() {
            let mut doc = YamlValue::Mapping(Mapping::new());
            set_path(&mut doc, "entities.run[0]", "1".into()).unwrap();
            assert_eq!(doc, yaml("entities: {'run[0]': '1'}"));
        }
    }
}
