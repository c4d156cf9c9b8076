//! Per-updater scratch directory.
//!
//! Each [`Updater`](super::Updater) owns exactly one scratch directory. It is
//! removed in full on [`ScratchDir::cleanup`] or drop, unless ownership has
//! been handed to the launcher script with [`ScratchDir::release`], in which
//! case the script deletes it after installing.

use crate::error::{Result, UpdateError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a fresh, uniquely named directory under the system temp dir.
    pub fn create(app_name: &str) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), app_name)
    }

    /// Creates a fresh, uniquely named directory under `parent`.
    pub fn create_in(parent: &Path, app_name: &str) -> Result<Self> {
        let prefix = format!("{}-update-", sanitize(app_name));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(parent)
            .map_err(|e| {
                UpdateError::Filesystem(format!(
                    "cannot create scratch dir in {}: {e}",
                    parent.display()
                ))
            })?;
        let path = dir.path().to_path_buf();
        tracing::debug!("scratch dir created at {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this instance still deletes the directory on cleanup/drop.
    pub fn is_owned(&self) -> bool {
        self.dir.is_some()
    }

    /// Gives up ownership: the directory survives this process and someone
    /// else (the update script) must remove it.
    pub fn release(&mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.path.clone()
    }

    /// Removes the directory and everything in it. No-op after `release`.
    pub fn cleanup(&mut self) -> Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(|e| {
                UpdateError::Filesystem(format!(
                    "cannot remove scratch dir {}: {e}",
                    self.path.display()
                ))
            }),
            None => Ok(()),
        }
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "app".to_owned()
    } else {
        cleaned
    }
}
