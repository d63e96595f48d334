//! Directory lock set.
//!
//! Directories with an active conversion are counted here so the external
//! library scanner can skip them while temp files and half-renamed outputs
//! are in flight. Counted rather than boolean: two jobs may target the same
//! directory, and the lock must hold until the last one finishes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Default)]
pub struct DirectoryLockSet {
    inner: Mutex<HashMap<PathBuf, usize>>,
}

impl DirectoryLockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take (or stack) a lock on a directory.
    pub fn lock(&self, dir: &Path) {
        if let Ok(mut map) = self.inner.lock() {
            *map.entry(dir.to_path_buf()).or_insert(0) += 1;
        }
    }

    /// Release one lock on a directory; the entry disappears when the count
    /// reaches zero. Unbalanced releases are logged and ignored.
    pub fn unlock(&self, dir: &Path) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        match map.get_mut(dir) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                map.remove(dir);
            }
            None => warn!(dir = %dir.display(), "unlock of a directory that was not locked"),
        }
    }

    pub fn is_locked(&self, dir: &Path) -> bool {
        self.inner
            .lock()
            .map(|map| map.contains_key(dir))
            .unwrap_or(false)
    }

    pub fn locked_count(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }
}
