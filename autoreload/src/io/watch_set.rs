//! Snapshot of watched files and their modification times.
//!
//! Built once when a worker starts. Files that appear later are not picked
//! up; a file that matches no pattern at startup is never watched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{debug, warn};

use crate::core::staleness::file_changed;
use crate::io::modified;

/// Absolute path → mtime observed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    files: BTreeMap<PathBuf, SystemTime>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand each pattern and record the current mtime of every matched file.
    ///
    /// A pattern is a file path, a directory (watched recursively) or a glob.
    pub fn resolve<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut set = Self::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let matched = expand(pattern)?;
            if matched.is_empty() {
                warn!(pattern, "watch pattern matched no files");
            }
            for path in matched {
                set.insert_file(&path)?;
            }
        }
        debug!(files = set.len(), "watch set resolved");
        Ok(set)
    }

    /// Record `path` with its current mtime. Missing files are skipped.
    pub fn insert_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            warn!(path = %path.display(), "not watching missing file");
            return Ok(());
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("resolve watched file {}", path.display()))?;
        if let Some(mtime) = modified(&path) {
            self.files.insert(path, mtime);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// First watched file that was deleted or got a newer mtime, if any.
    ///
    /// Scanning stops at the first hit; which one wins when several changed
    /// is unspecified.
    pub fn first_change(&self) -> Option<&Path> {
        self.files
            .iter()
            .find(|(path, recorded)| file_changed(**recorded, modified(path)))
            .map(|(path, _)| path.as_path())
    }
}

fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let glob_pattern = if path.is_dir() {
        let dir = pattern.trim_end_matches('/');
        format!("{}/**/*", Pattern::escape(dir))
    } else {
        pattern.to_string()
    };

    let entries =
        glob::glob(&glob_pattern).with_context(|| format!("parse watch pattern {pattern}"))?;
    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!(err = %err, pattern, "skipping unreadable watch entry"),
        }
    }
    Ok(files)
}
