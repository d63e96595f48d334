//! Commit coordinator.
//!
//! After a successful transcode the finished file is moved into the library
//! and recorded in the store, in a fixed order: verify output, embed cover,
//! stat, rename into place, store transaction, then delete sources. The
//! store transaction is deliberately ordered before source deletion so a
//! failed commit leaves every original on disk; the renamed file is orphaned
//! but recoverable.

use crate::cover;
use crate::job::{JobPaths, SourceFile};
use crate::store::{ConversionCommit, LibraryStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for finalization failures.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The transcode claimed success but produced no usable output.
    #[error("transcode produced no output at {0}")]
    MissingOutput(String),

    /// The finished file could not be moved into the library.
    #[error("failed to move output into library: {0}")]
    Rename(std::io::Error),

    /// The library store rejected the transaction.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// IO error reading the finished file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for the finalize sequence.
#[derive(Debug, Clone)]
pub struct CommitSettings {
    pub tag_tool_path: String,
    pub embed_timeout: Duration,
}

/// Drive the ordered finalize sequence for a finished transcode.
///
/// `cover_available` reflects whether the earlier extraction step produced a
/// cover file; embedding is attempted only then and never fails the job.
/// Returns the finished file's size in bytes.
pub async fn finalize_conversion(
    paths: &JobPaths,
    item_id: &str,
    sources: &[SourceFile],
    cover_available: bool,
    settings: &CommitSettings,
    store: &Arc<dyn LibraryStore>,
) -> Result<u64, CommitError> {
    let meta = tokio::fs::metadata(&paths.temp_output)
        .await
        .map_err(|_| CommitError::MissingOutput(paths.temp_output.display().to_string()))?;
    if meta.len() == 0 {
        return Err(CommitError::MissingOutput(
            paths.temp_output.display().to_string(),
        ));
    }

    if cover_available {
        cover::embed_cover(
            &settings.tag_tool_path,
            &paths.temp_output,
            &paths.temp_cover,
            settings.embed_timeout,
        )
        .await;
        if let Err(e) = tokio::fs::remove_file(&paths.temp_cover).await {
            debug!("cover temp file not removed: {e}");
        }
    }

    // Re-stat after embedding; the tag tool rewrites the container.
    let size_bytes = tokio::fs::metadata(&paths.temp_output)
        .await
        .map(|m| m.len())
        .unwrap_or(meta.len());

    if let Some(parent) = paths.final_output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    move_into_place(&paths.temp_output, &paths.final_output).await?;

    store
        .commit_conversion(ConversionCommit {
            item_id: item_id.to_string(),
            output_path: paths.final_output.clone(),
            size_bytes,
            replaced_sources: sources.iter().map(|s| s.path.clone()).collect(),
        })
        .await?;

    // Sources go only after the store transaction succeeded, best-effort.
    for source in sources {
        if source.path == paths.final_output {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(&source.path).await {
            warn!(source = %source.path.display(), "source file not deleted: {e}");
        }
    }

    info!(
        output = %paths.final_output.display(),
        size_bytes,
        "conversion committed"
    );
    Ok(size_bytes)
}

/// Rename with a copy-and-remove fallback for cross-filesystem moves.
async fn move_into_place(from: &Path, to: &Path) -> Result<(), CommitError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await.map_err(CommitError::Rename)?;
    tokio::fs::remove_file(from).await.map_err(CommitError::Rename)?;
    Ok(())
}

/// Remove a job's temporary side files, best-effort. Runs on success,
/// failure, and cancellation alike so nothing lingers after a terminal
/// state.
pub async fn cleanup_temp_files(paths: &JobPaths) {
    for path in [
        &paths.temp_output,
        &paths.temp_cover,
        &paths.concat_list,
        &paths.chapter_metadata,
    ] {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "temp file not removed: {e}"),
        }
    }
}
