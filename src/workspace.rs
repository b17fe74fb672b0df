//! Working directory for uploaded documents and translated artifacts.
//!
//! Files are referred to by bare names relative to the workspace root. Any
//! directory component in a name is discarded before it touches the
//! filesystem, so a name can never point outside the workspace.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::WorkspaceConfig;
use crate::document::DocumentKind;
use crate::error::{DoctransError, Result};

/// Prefix of uploaded working files.
pub const UPLOAD_PREFIX: &str = "trans";
/// Prefix of rewritten artifacts waiting for delivery.
pub const OUTPUT_PREFIX: &str = "translated";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directory if needed.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Collision-free file name, e.g. `trans_3f2a….xlsx`.
    pub fn unique_name(prefix: &str, kind: DocumentKind) -> String {
        format!("{}_{}.{}", prefix, Uuid::new_v4().simple(), kind.extension())
    }

    /// Absolute location of a working file. Only the last path component of
    /// `name` is used.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let base = Path::new(name)
            .file_name()
            .ok_or_else(|| DoctransError::WorkingFileMissing(name.to_string()))?;
        Ok(self.root.join(base))
    }

    /// Write `bytes` under a fresh name and return that name.
    pub fn store(&self, prefix: &str, kind: DocumentKind, bytes: &[u8]) -> Result<String> {
        self.ensure()?;
        let name = Self::unique_name(prefix, kind);
        let path = self.root.join(&name);
        fs::write(&path, bytes)?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(name)
    }

    /// Location of an existing working file.
    pub fn existing(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(DoctransError::WorkingFileMissing(display_name(name)));
        }
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DoctransError::WorkingFileMissing(display_name(name)),
            _ => DoctransError::Io(e),
        })
    }

    /// Delete a working file. A file that is already gone is not an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        remove_quietly(&path)
    }

    /// Guard that deletes the working file `name` when dropped.
    pub fn scoped(&self, name: &str) -> Result<ScopedFile> {
        Ok(ScopedFile::new(self.resolve(name)?))
    }

    /// Remove working files last modified more than `max_age` ago.
    /// Returns how many were removed.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }

        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| DoctransError::Config(format!("Invalid stale age: {}", e)))?;
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable workspace entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_working_file(entry.file_name()) {
                continue;
            }

            let modified: DateTime<Utc> = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(time) => time.into(),
                None => continue,
            };

            if modified < cutoff {
                debug!("Removing stale working file {}", entry.path().display());
                remove_quietly(entry.path())?;
                removed += 1;
            }
        }

        info!("Removed {} stale working files", removed);
        Ok(removed)
    }
}

fn is_working_file(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    [UPLOAD_PREFIX, OUTPUT_PREFIX]
        .iter()
        .any(|prefix| name.starts_with(&format!("{}_", prefix)))
}

/// Base name of a reference, for messages that must not leak locations.
fn display_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn remove_quietly(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Deletes its file on drop unless [`ScopedFile::keep`] was called.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
    armed: bool,
}

impl ScopedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the file in place.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = remove_quietly(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}
