//! Heartbeat file: the supervisor's liveness pulse.
//!
//! Only existence and mtime matter; the file is always empty.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tempfile::TempPath;
use tracing::debug;

/// Uniquely named heartbeat file, removed when dropped.
#[derive(Debug)]
pub struct Heartbeat {
    path: TempPath,
}

impl Heartbeat {
    /// Create a fresh heartbeat in `dir`, or the system temp directory.
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("autoreload-").suffix(".heartbeat");
        let file = match dir {
            Some(dir) => {
                let dir = std::path::absolute(dir)
                    .with_context(|| format!("resolve heartbeat dir {}", dir.display()))?;
                builder
                    .tempfile_in(&dir)
                    .with_context(|| format!("create heartbeat in {}", dir.display()))?
            }
            None => builder.tempfile().context("create heartbeat")?,
        };
        let path = file.into_temp_path();
        debug!(path = %path.display(), "heartbeat created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Refresh the mtime to now.
    pub fn touch(&self) -> Result<()> {
        touch(&self.path)
    }

    /// Remove the file now. A file already deleted by someone else is not an error.
    pub fn remove(self) -> Result<()> {
        let display = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove heartbeat {display}")),
        }
    }
}

/// Set the mtime of an existing file to now. Never creates the file.
pub fn touch(path: &Path) -> Result<()> {
    set_mtime(path, SystemTime::now())
}

/// Set the mtime of an existing file to `time`.
pub fn set_mtime(path: &Path, time: SystemTime) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.set_modified(time)
        .with_context(|| format!("set mtime {}", path.display()))?;
    Ok(())
}
