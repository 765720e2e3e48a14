//! # Path Extraction
//!
//! Derives structured fields from a recording's path. Two notations are
//! supported:
//!
//! - **Regex mode**: a regular expression plus an ordered list of field names,
//!   one per capture group.
//! - **Placeholder mode**: field names written inline between delimiters,
//!   e.g. `sub-%entities.subject%/ses-%entities.session%/%entities.task%.vhdr`.
//!   The pattern is lowered into an equivalent regex (literals escaped,
//!   placeholders replaced by the matcher) and handed to regex mode.
//!
//! Paths (and placeholder patterns) are normalized to forward slashes first.
//! The regex is searched for from the left; it is not anchored at the end, so
//! quantifier greediness decides how much of the path a group takes.
//!
//! Each captured value is stored at its dotted field path in a fresh document.
//! A field called `ignore` is kept at the top level of that document; callers
//! remove it with [`strip_ignored`] before merging.
//!
//! ```
//! use sovabids::extract::parse_from_placeholder;
//!
//! let fields = parse_from_placeholder(
//!     r"data\sub-010002\ses-001\resting\sub-010002.vhdr",
//!     "sub-%ignore%/ses-%entities.session%/%entities.task%/sub-%entities.subject%.vhdr",
//!     "%",
//!     "(.+)",
//! )
//! .unwrap();
//! assert_eq!(fields["entities"]["subject"], "010002");
//! assert_eq!(fields["entities"]["task"], "resting");
//! ```

use log::debug;
use regex::Regex;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{Error, Result};
use crate::merge::set_path;
use crate::rules::{normalize_path, PathAnalysis};

/// Field name whose captures are discarded.
pub const IGNORE_FIELD: &str = "ignore";

/// Extract fields from `path` as described by a `path_analysis` section.
pub fn extract(path: &str, analysis: &PathAnalysis) -> Result<YamlValue> {
    match &analysis.fields {
        Some(fields) => {
            let fields = fields.clone().into_vec();
            parse_from_regex(path, &analysis.pattern, fields.as_slice())
        }
        None => parse_from_placeholder(path, &analysis.pattern, &analysis.encloser, &analysis.matcher),
    }
}

/// Regex mode: one field name per capture group, left to right.
///
/// # Errors
///
/// - `Error::Regex` if the pattern does not compile.
/// - `Error::FieldCountMismatch` if the group and field counts differ.
/// - `Error::PatternMismatch` if the path does not match.
pub fn parse_from_regex<S: AsRef<str>>(path: &str, pattern: &str, fields: &[S]) -> Result<YamlValue> {
    let path = normalize_path(path);
    let regex = Regex::new(pattern)?;

    let groups = regex.captures_len() - 1;
    if groups != fields.len() {
        return Err(Error::FieldCountMismatch {
            pattern: pattern.to_string(),
            groups,
            fields: fields.len(),
        });
    }

    let captures = regex.captures(&path).ok_or_else(|| Error::PatternMismatch {
        path: path.clone(),
        pattern: pattern.to_string(),
    })?;

    let mut extracted = YamlValue::Mapping(Mapping::new());
    for (index, field) in fields.iter().enumerate() {
        let value = captures
            .get(index + 1)
            .map(|m| YamlValue::String(m.as_str().to_string()))
            .unwrap_or(YamlValue::Null);
        set_path(&mut extracted, field.as_ref(), value)?;
    }

    debug!("Extracted {} field(s) from '{}'", fields.len(), path);
    Ok(extracted)
}

/// Lower a placeholder pattern into a regex and its ordered field names.
///
/// Text outside the enclosers is escaped literally; each `%name%` becomes
/// `matcher`.
///
/// ```
/// use sovabids::extract::placeholder_to_regex;
///
/// let (regex, fields) = placeholder_to_regex("sub-%entities.subject%.vhdr", "%", "(.+)").unwrap();
/// assert_eq!(regex, r"sub\-(.+)\.vhdr");
/// assert_eq!(fields, vec!["entities.subject".to_string()]);
/// ```
pub fn placeholder_to_regex(pattern: &str, encloser: &str, matcher: &str) -> Result<(String, Vec<String>)> {
    if encloser.is_empty() {
        return Err(Error::PatternSyntax {
            pattern: pattern.to_string(),
            message: "the encloser must not be empty".to_string(),
        });
    }

    let normalized = normalize_path(pattern);
    let parts: Vec<&str> = normalized.split(encloser).collect();
    if parts.len() % 2 == 0 {
        return Err(Error::PatternSyntax {
            pattern: pattern.to_string(),
            message: format!("unbalanced '{}' delimiters", encloser),
        });
    }

    let mut regex = String::new();
    let mut fields = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        if index % 2 == 0 {
            regex.push_str(&regex::escape(part));
        } else if part.is_empty() {
            return Err(Error::PatternSyntax {
                pattern: pattern.to_string(),
                message: format!("empty placeholder '{}{}'", encloser, encloser),
            });
        } else {
            regex.push_str(matcher);
            fields.push(part.to_string());
        }
    }

    Ok((regex, fields))
}

/// Placeholder mode: lower the pattern, then extract as in regex mode.
pub fn parse_from_placeholder(path: &str, pattern: &str, encloser: &str, matcher: &str) -> Result<YamlValue> {
    let (regex, fields) = placeholder_to_regex(pattern, encloser, matcher)?;
    parse_from_regex(path, &regex, fields.as_slice())
}

/// Remove the top-level `ignore` field, returning whether it was present.
pub fn strip_ignored(document: &mut YamlValue) -> bool {
    document
        .as_mapping_mut()
        .and_then(|map| map.remove(IGNORE_FIELD))
        .is_some()
}
