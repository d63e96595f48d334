//! Admission validation for conversion requests.
//!
//! All rejections here happen synchronously, before a job record exists.

use crate::job::SourceFile;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Destination container extension.
pub const DEST_EXTENSION: &str = "m4b";

/// Source extensions whose codec is already MP4-family; these repackage via
/// stream-copy instead of re-encoding.
pub const COPY_COMPATIBLE_EXTENSIONS: &[&str] = &["m4b", "m4a", "mp4", "aac"];

/// All source extensions the engine will convert (case-insensitive matching).
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &[
    "m4b", "m4a", "mp4", "aac", "mp3", "ogg", "oga", "opus", "flac", "wma", "wav", "aiff", "webm",
    "webma", "mka",
];

/// Reasons a conversion request is rejected before a job is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No source files were supplied.
    #[error("No source files to convert")]
    NoSources,

    /// The source extension is not convertible.
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    /// A single-file item already in the destination container is a no-op.
    #[error("Item is already a single m4b file")]
    AlreadyConverted,

    /// A source file is missing on disk.
    #[error("Source file not found: {0}")]
    MissingSource(PathBuf),

    /// The item already has an active conversion job.
    #[error("Item {0} already has an active conversion")]
    AlreadyActive(String),
}

/// Lowercased extension of a path, if any.
pub fn source_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn is_convertible(ext: &str) -> bool {
    CONVERTIBLE_EXTENSIONS.contains(&ext)
}

/// Whether a source extension can be stream-copied into the destination
/// container with no re-encode.
pub fn is_copy_compatible(ext: &str) -> bool {
    COPY_COMPATIBLE_EXTENSIONS.contains(&ext)
}

/// Validate the source set for a conversion request.
///
/// A single file already in the destination container is rejected as a no-op,
/// but a multi-file item in that container is accepted: merging its parts into
/// one file is the whole point of that request. This asymmetry is deliberate.
pub fn validate_sources(sources: &[SourceFile]) -> Result<(), ValidationError> {
    let first = sources.first().ok_or(ValidationError::NoSources)?;

    let ext = source_extension(&first.path)
        .ok_or_else(|| ValidationError::UnsupportedFormat("<none>".to_string()))?;

    if !is_convertible(&ext) {
        return Err(ValidationError::UnsupportedFormat(ext));
    }

    if sources.len() == 1 && ext == DEST_EXTENSION {
        return Err(ValidationError::AlreadyConverted);
    }

    for source in sources {
        if !source.path.exists() {
            return Err(ValidationError::MissingSource(source.path.clone()));
        }
    }

    Ok(())
}
