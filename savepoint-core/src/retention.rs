//! Count-based retention for the backup directory.
//!
//! Only regular files directly inside the directory are considered. They are
//! ordered oldest first by modification time, and everything beyond the
//! newest `keep` files is deleted. Delete failures are collected, never fatal.

use crate::error::PruneError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep: i32,
}

impl RetentionPolicy {
    pub fn new(keep: i32) -> Self {
        Self { keep }
    }

    /// Retention is disabled for any `keep <= 0`
    pub fn is_enabled(&self) -> bool {
        self.keep > 0
    }

    pub fn prune(&self, dir: &Path) -> Vec<PruneError> {
        self.prune_with(dir, |_| {})
    }

    /// Prune `dir`, calling `on_delete` before each file is removed
    pub fn prune_with<F>(&self, dir: &Path, mut on_delete: F) -> Vec<PruneError>
    where
        F: FnMut(&Path),
    {
        if !self.is_enabled() {
            return Vec::new();
        }

        let excess = match self.select_excess(dir) {
            Ok(excess) => excess,
            Err(e) => return vec![e],
        };

        let mut errors = Vec::new();
        for path in excess {
            on_delete(&path);
            match fs::remove_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "Deleted old backup"),
                Err(source) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %source,
                        "Failed to delete old backup"
                    );
                    errors.push(PruneError::Delete { path, source });
                }
            }
        }
        errors
    }

    /// The oldest files beyond the keep count, oldest first
    pub fn select_excess(&self, dir: &Path) -> Result<Vec<PathBuf>, PruneError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        let mut files = list_regular_files(dir)?;
        let keep = self.keep as usize;
        if files.len() <= keep {
            return Ok(Vec::new());
        }

        // Stable sort: equal timestamps keep directory order within one run
        files.sort_by_key(|(_, modified)| *modified);
        let excess = files.len() - keep;
        Ok(files.into_iter().take(excess).map(|(path, _)| path).collect())
    }
}

/// Convenience form of [`RetentionPolicy::prune`]
pub fn prune(dir: &Path, keep: i32) -> Vec<PruneError> {
    RetentionPolicy::new(keep).prune(dir)
}

fn list_regular_files(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>, PruneError> {
    let list_error = |source| PruneError::List {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        if !entry.file_type().map_err(list_error)?.is_file() {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).map_err(list_error)?;
        files.push((entry.path(), modified));
    }
    Ok(files)
}
