use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Remembers the original content of files before the formatter rewrites
/// them, so a failed run can put everything back.
pub struct FileTracker {
    /// Original content of each tracked file
    originals: HashMap<PathBuf, Vec<u8>>,
    /// Whether automatic restore on drop is enabled
    restore_enabled: bool,
    /// Whether to roll back when dropped
    force_rollback: bool,
}

impl Default for FileTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTracker {
    /// Creates a new FileTracker with restore on drop enabled
    pub fn new() -> Self {
        Self {
            originals: HashMap::new(),
            restore_enabled: true,
            force_rollback: false,
        }
    }

    /// Creates a new FileTracker with restore on drop configurable
    pub fn new_with_restore(restore_enabled: bool) -> Self {
        Self {
            originals: HashMap::new(),
            restore_enabled,
            force_rollback: false,
        }
    }

    /// Starts tracking a file, keeping its current content for rollback
    pub fn track_file(&mut self, path: &Path) -> Result<()> {
        debug!("Tracking file: {}", path.display());

        if self.originals.contains_key(path) {
            debug!("File already tracked: {}", path.display());
            return Ok(());
        }

        let content = fs::read(path).map_err(|e| Error::FileOperation {
            path: path.to_path_buf(),
            message: format!("Failed to read file content: {}", e),
        })?;
        self.originals.insert(path.to_path_buf(), content);

        info!("Started tracking file: {}", path.display());
        Ok(())
    }

    /// Roll back when the tracker is dropped
    pub fn force_rollback(&mut self) {
        self.force_rollback = true;
    }

    /// Restores all tracked files to their original content
    pub fn rollback(&mut self) -> Result<()> {
        info!("Rolling back file changes...");

        for (path, content) in &self.originals {
            fs::write(path, content).map_err(|e| Error::FileOperation {
                path: path.clone(),
                message: format!("Failed to restore file content: {}", e),
            })?;
            info!("Restored original content to {}", path.display());
        }

        self.originals.clear();
        info!("Rollback completed successfully");
        Ok(())
    }
}

impl Drop for FileTracker {
    fn drop(&mut self) {
        // Only roll back if a failure asked for it and restore is enabled
        if self.force_rollback && self.restore_enabled && !self.originals.is_empty() {
            if let Err(e) = self.rollback() {
                warn!("Error during automatic rollback: {}", e);
            }
        }
    }
}

/// A guard wrapper around FileTracker that simplifies working with tracked files
pub struct FileTrackerGuard {
    inner: FileTracker,
}

impl Default for FileTrackerGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTrackerGuard {
    /// Creates a new FileTrackerGuard with restore on drop enabled
    pub fn new() -> Self {
        Self {
            inner: FileTracker::new(),
        }
    }

    /// Creates a new FileTrackerGuard with restore on drop configurable
    pub fn new_with_restore(restore_enabled: bool) -> Self {
        Self {
            inner: FileTracker::new_with_restore(restore_enabled),
        }
    }

    /// Starts tracking a file
    pub fn track_file(&mut self, path: &Path) -> Result<()> {
        self.inner.track_file(path)
    }

    /// Roll back tracked changes when the guard is dropped
    pub fn force_rollback(&mut self) {
        self.inner.force_rollback();
    }
}
