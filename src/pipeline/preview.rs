//! Preview artifact rollback
//!
//! A preview writes a cropped sample of the recording into the real output
//! tree so that the sidecar and channel table can be shown to the user, and
//! then has to leave that tree exactly as it found it.
//!
//! [`ArtifactGuard`] records every path under the output root before the
//! write. On [`rollback`](ArtifactGuard::rollback), or when dropped, it
//! restores the content of files it was asked to
//! [`preserve`](ArtifactGuard::preserve), then removes every file and every
//! directory that was not there before, deepest first. Failures are logged
//! as warnings and never abort the rollback.

use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Scoped snapshot of an output tree.
#[derive(Debug)]
pub struct ArtifactGuard {
    root: PathBuf,
    before: HashSet<PathBuf>,
    preserved: Vec<(PathBuf, Vec<u8>)>,
    finished: bool,
}

impl ArtifactGuard {
    /// Record the current content of `root` (which may not exist yet).
    pub fn snapshot(root: &Path) -> Result<Self> {
        let before = if root.exists() {
            list_entries(root)?.into_iter().collect()
        } else {
            HashSet::new()
        };
        debug!("Snapshot of '{}': {} existing entries", root.display(), before.len());
        Ok(Self {
            root: root.to_path_buf(),
            before,
            preserved: Vec::new(),
            finished: false,
        })
    }

    /// Keep the current bytes of an existing file so rollback can restore
    /// them. Missing files are ignored; they are removed like any new file.
    pub fn preserve(&mut self, path: &Path) -> Result<()> {
        if path.is_file() {
            self.preserved.push((path.to_path_buf(), fs::read(path)?));
        }
        Ok(())
    }

    /// Preserve every regular file directly inside `dir`, if it exists.
    pub fn preserve_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() {
                self.preserve(entry.path())?;
            }
        }
        Ok(())
    }

    /// Undo everything written under the root since the snapshot.
    ///
    /// Returns the cleanup failures, each already logged. Calling it again is
    /// a no-op.
    pub fn rollback(&mut self) -> Vec<Error> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut failures = Vec::new();
        for (path, content) in &self.preserved {
            if let Err(e) = fs::write(path, content) {
                failures.push(cleanup_failure(path, e.to_string()));
            }
        }

        if !self.root.exists() {
            return failures;
        }
        let entries = match list_entries(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                failures.push(cleanup_failure(&self.root, e.to_string()));
                return failures;
            }
        };

        let (mut dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = entries
            .into_iter()
            .filter(|path| !self.before.contains(path))
            .partition(|path| path.is_dir() && !path.is_symlink());

        for file in &files {
            match fs::remove_file(file) {
                Ok(()) => debug!("Removed preview artifact '{}'", file.display()),
                Err(e) => failures.push(cleanup_failure(file, e.to_string())),
            }
        }

        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in &dirs {
            if let Err(e) = fs::remove_dir(dir) {
                failures.push(cleanup_failure(dir, e.to_string()));
            }
        }

        failures
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        self.rollback();
    }
}

fn list_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root) {
        entries.push(entry?.into_path());
    }
    Ok(entries)
}

fn cleanup_failure(path: &Path, message: String) -> Error {
    let error = Error::ArtifactCleanup {
        path: path.to_path_buf(),
        message,
    };
    warn!("{}", error);
    error
}
