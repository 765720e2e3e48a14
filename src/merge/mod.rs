//! Rule document merging
//!
//! Rule documents are nested YAML values. This module holds the pieces shared
//! by the merger and the path extractor:
//!
//! - [`yaml`]: right-biased deep merge of documents and dotted-path assignment.
//! - [`parse_path`]: splitting a field name such as `entities.subject` into
//!   the mapping keys it addresses.

pub mod yaml;

pub use yaml::{merge, merge_into, set_path};

/// Split a dotted field name into mapping keys.
///
/// Field names are plain dot-separated paths. Every other character,
/// brackets included, is part of a key. Returns `None` when the name is
/// blank or has an empty segment (`entities..run`, `.subject`).
///
/// # Examples
///
/// ```
/// use sovabids::merge::parse_path;
///
/// assert_eq!(parse_path("entities.subject"), Some(vec!["entities", "subject"]));
/// assert_eq!(parse_path("entities.run[0]"), Some(vec!["entities", "run[0]"]));
/// assert_eq!(parse_path("entities..run"), None);
/// ```
pub fn parse_path(field: &str) -> Option<Vec<&str>> {
    if field.trim().is_empty() {
        return None;
    }
    let keys: Vec<&str> = field.split('.').collect();
    if keys.iter().any(|key| key.is_empty()) {
        return None;
    }
    Some(keys)
}
