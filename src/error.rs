//! # Error Handling
//!
//! This module defines the centralized error type for the `sovabids` library.
//! It uses `thiserror` to describe every failure mode of the rule resolution
//! and mapping engine with enough context to report a failed file to the user.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into three groups:
//!   - per-file extraction and validation failures (`PatternMismatch`,
//!     `FieldCountMismatch`, `PatternSyntax`, `MissingEntities`,
//!     `InvalidEntity`), which the aggregator records and skips;
//!   - non-fatal conditions that are logged rather than returned
//!     (`ExtensionHook`, `ArtifactCleanup`);
//!   - argument, collaborator and I/O failures.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Each variant has a stable short name available through [`Error::kind`],
//! which is what failure reports and the CLI summary print.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sovabids operations
#[derive(Error, Debug)]
pub enum Error {
    /// The path did not match the extraction pattern.
    #[error("Path '{path}' does not match pattern '{pattern}'")]
    PatternMismatch { path: String, pattern: String },

    /// The number of capture groups differs from the number of field names.
    #[error("Pattern '{pattern}' has {groups} capture group(s) but {fields} field name(s) were given")]
    FieldCountMismatch {
        pattern: String,
        groups: usize,
        fields: usize,
    },

    /// A placeholder pattern could not be lowered into a regex.
    #[error("Invalid placeholder pattern '{pattern}': {message}")]
    PatternSyntax { pattern: String, message: String },

    /// The merged rule document has no `entities` section.
    #[error("Rules for '{file}' have no 'entities' section")]
    MissingEntities { file: String },

    /// An entity cannot be used to build a target path.
    #[error("Invalid entity '{name}': {message}")]
    InvalidEntity { name: String, message: String },

    /// An extension hook failed. Logged and skipped, never propagated by the
    /// pipeline.
    #[error("Extension hook '{command}' failed: {message}")]
    ExtensionHook { command: String, message: String },

    /// A preview artifact could not be removed or restored during rollback.
    #[error("Could not roll back preview artifact '{}': {message}", path.display())]
    ArtifactCleanup { path: PathBuf, message: String },

    /// The source argument is neither a path nor a non-empty list of paths.
    #[error("Invalid source: {message}")]
    SourcePathType { message: String },

    /// A rule document is nested deeper than the merge depth limit.
    #[error("Merge depth limit of {limit} exceeded at '{path}'")]
    MergeDepthExceeded { path: String, limit: usize },

    /// A rule document has an unexpected shape.
    #[error("Rule parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    RuleParse {
        message: String,
        /// Optional hint for how to fix the rules
        hint: Option<String>,
    },

    /// Preview or write mode was requested without a reader/writer pair.
    #[error("No recording backend configured for {mode} mode")]
    BackendUnavailable { mode: String },

    /// The recording reader or dataset writer reported a failure.
    #[error("Recording error for '{}': {message}", path.display())]
    Recording { path: PathBuf, message: String },

    /// A file-system operation on the output tree failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A directory walk error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Short, stable name of the error kind used in failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PatternMismatch { .. } => "PatternMismatchError",
            Error::FieldCountMismatch { .. } => "FieldCountMismatchError",
            Error::PatternSyntax { .. } => "PatternSyntaxError",
            Error::MissingEntities { .. } => "MissingEntitiesError",
            Error::InvalidEntity { .. } => "InvalidEntityError",
            Error::ExtensionHook { .. } => "ExtensionHookError",
            Error::ArtifactCleanup { .. } => "ArtifactCleanupError",
            Error::SourcePathType { .. } => "SourcePathTypeError",
            Error::MergeDepthExceeded { .. } => "MergeDepthExceededError",
            Error::RuleParse { .. } => "RuleParseError",
            Error::BackendUnavailable { .. } => "BackendUnavailableError",
            Error::Recording { .. } => "RecordingError",
            Error::Filesystem { .. } => "FilesystemError",
            Error::Io(_) => "IoError",
            Error::Yaml(_) => "YamlError",
            Error::Json(_) => "JsonError",
            Error::Regex(_) => "RegexError",
            Error::Glob(_) => "GlobError",
            Error::Walk(_) => "WalkError",
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
