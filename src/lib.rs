//! # sovabids
//!
//! Rule resolution and mapping engine for converting loosely organized EEG
//! recordings into a BIDS dataset layout. It is used by the `sovabids`
//! command-line tool and can be embedded in other applications.
//!
//! ## Quick Example
//!
//! ```
//! use sovabids::pipeline::{MappingBuilder, Mode};
//! use std::path::Path;
//!
//! let rules: serde_yaml::Value = serde_yaml::from_str(r#"
//! entities:
//!   task: resting
//! non-bids:
//!   path_analysis:
//!     pattern: sub-%entities.subject%/ses-%entities.session%/%ignore%.vhdr
//! "#).unwrap();
//!
//! let mapping = MappingBuilder::new()
//!     .build(Path::new("raw/sub-01/ses-2/rec.vhdr"), &rules, Path::new("bids"), Mode::Dry)
//!     .unwrap();
//!
//! assert_eq!(mapping.record["entities"]["subject"], "01");
//! assert_eq!(
//!     mapping.record["IO"]["target"],
//!     "bids/sub-01/ses-2/eeg/sub-01_ses-2_task-resting_eeg.vhdr"
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Rules (`rules`)**: YAML rule documents, typed views on their sections,
//!   and discovery of the recordings to map.
//! - **Extraction (`extract`)**: fields derived from a file path, written as a
//!   regex plus field names or in `%placeholder%` notation.
//! - **Merging (`merge`)**: right-biased deep merge of rule documents.
//! - **Pipeline (`pipeline`)**: one file plus merged rules to a mapping record,
//!   in dry, preview or write mode.
//! - **Aggregation (`aggregate`)**: the pipeline over many files, persisted as
//!   a mapping file.
//! - **Collaborators (`recording`, `hooks`)**: traits for reading and writing
//!   recordings, and named extension callbacks.
//! - **Layout (`layout`)**: BIDS target paths from entities.

pub mod aggregate;
pub mod defaults;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod layout;
pub mod merge;
pub mod pipeline;
pub mod recording;
pub mod rules;

#[cfg(test)]
mod extract_proptest;
