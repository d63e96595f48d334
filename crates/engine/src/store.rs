//! Library store seam.
//!
//! The engine commits a finished conversion to the library through a single
//! transactional primitive so the commit coordinator can order the database
//! write strictly before source deletion. The surrounding catalog layer
//! provides the real implementation; [`MemoryStore`] backs the CLI and tests.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Error type for library store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the commit.
    #[error("library store rejected commit: {0}")]
    Rejected(String),

    /// The store backend is unreachable.
    #[error("library store unavailable: {0}")]
    Unavailable(String),
}

/// A finished conversion ready to be recorded in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCommit {
    /// Library item the conversion belongs to.
    pub item_id: String,
    /// Final audiobook path inside the library directory.
    pub output_path: PathBuf,
    /// Size of the finished file in bytes.
    pub size_bytes: u64,
    /// Source files superseded by the conversion.
    pub replaced_sources: Vec<PathBuf>,
}

/// Transactional seam between the engine and the library catalog.
///
/// `commit_conversion` must be atomic from the caller's view: either the
/// item's track list reflects the new audiobook, or the call errors and the
/// catalog is unchanged.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn commit_conversion(&self, commit: ConversionCommit) -> Result<(), StoreError>;
}

/// In-memory store used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: Mutex<Vec<ConversionCommit>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commits fail with the given message.
    pub fn inject_failure(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.fail_with.lock() {
            *slot = Some(message.into());
        }
    }

    /// All commits recorded so far.
    pub fn commits(&self) -> Vec<ConversionCommit> {
        self.commits
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn commit_conversion(&self, commit: ConversionCommit) -> Result<(), StoreError> {
        if let Ok(slot) = self.fail_with.lock() {
            if let Some(message) = slot.as_ref() {
                return Err(StoreError::Rejected(message.clone()));
            }
        }
        if let Ok(mut commits) = self.commits.lock() {
            commits.push(commit);
        }
        Ok(())
    }
}
