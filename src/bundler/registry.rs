//! Ledger of ephemeral directories.
//!
//! Every temporary directory created during packaging is recorded here so
//! that it can be released individually by the stage that created it, or
//! swept wholesale when the process shuts down. The registry is an ordinary
//! value shared through an `Arc`; tests build their own isolated instance.

use crate::bundler::error::{ErrorExt, Result};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Handle to a directory owned by a [`TempRegistry`].
///
/// The handle is only a path; ownership stays with the registry until
/// [`TempRegistry::release`] or [`TempRegistry::release_all`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempDirHandle {
    path: PathBuf,
}

impl TempDirHandle {
    /// Path of the backing directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Joins a relative path onto the backing directory.
    pub fn join(&self, child: impl AsRef<Path>) -> PathBuf {
        self.path.join(child)
    }
}

impl AsRef<Path> for TempDirHandle {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Mutex-protected ledger of temporary directories.
#[derive(Debug)]
pub struct TempRegistry {
    root: PathBuf,
    entries: Mutex<BTreeSet<PathBuf>>,
}

impl Default for TempRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TempRegistry {
    /// Creates a registry that allocates under the system temp directory.
    pub fn new() -> Self {
        Self::with_root(std::env::temp_dir())
    }

    /// Creates a registry that allocates under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Mutex::new(BTreeSet::new()),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        // A panic while holding the lock leaves the set itself intact.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a uniquely named directory `<prefix><uuid><suffix>` and records it.
    pub fn create(&self, prefix: &str, suffix: &str) -> Result<TempDirHandle> {
        std::fs::create_dir_all(&self.root).fs_context("creating temp root", &self.root)?;

        let path = self
            .root
            .join(format!("{}{}{}", prefix, Uuid::new_v4().simple(), suffix));
        std::fs::create_dir(&path).fs_context("creating temp directory", &path)?;

        self.ledger().insert(path.clone());
        log::debug!("Created temp directory {}", path.display());

        Ok(TempDirHandle { path })
    }

    /// Deletes the directory behind `handle` and forgets it.
    ///
    /// Releasing twice, or releasing a directory that already vanished, is a no-op.
    /// Deletion failures are logged and never returned.
    pub fn release(&self, handle: &TempDirHandle) {
        let removed = self.ledger().remove(&handle.path);
        if !removed {
            log::debug!(
                "Temp directory {} already released",
                handle.path.display()
            );
        }
        delete_tree(&handle.path);
    }

    /// Deletes every recorded directory and empties the ledger.
    ///
    /// Tolerates an empty ledger, and keeps going after a failed deletion.
    pub fn release_all(&self) {
        let drained = std::mem::take(&mut *self.ledger());
        if drained.is_empty() {
            return;
        }

        log::debug!("Cleaning up {} temporary directories", drained.len());
        for path in drained {
            delete_tree(&path);
        }
    }

    /// Number of directories currently recorded.
    pub fn len(&self) -> usize {
        self.ledger().len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.ledger().is_empty()
    }

    /// Whether `path` is currently recorded.
    pub fn contains(&self, path: &Path) -> bool {
        self.ledger().contains(path)
    }
}

fn delete_tree(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => log::debug!("Removed temp directory {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove temp directory {}: {}", path.display(), e),
    }
}

/// Scope guard that sweeps the registry when dropped.
///
/// Installed by the entry routine so that every exit path, including an
/// early `?` return or a panic unwinding through it, releases what is left.
#[derive(Debug)]
pub struct CleanupGuard {
    registry: Arc<TempRegistry>,
}

impl CleanupGuard {
    /// Guards `registry` until the returned value is dropped.
    pub fn new(registry: Arc<TempRegistry>) -> Self {
        Self { registry }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.registry.release_all();
    }
}
