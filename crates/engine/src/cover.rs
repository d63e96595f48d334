//! Cover art pipeline.
//!
//! Extracts embedded cover art from the first source file and embeds it into
//! the finished audiobook. Both steps are best-effort: they run under a
//! timeout, resolve to a bool, and never fail the surrounding job.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Attempt to extract embedded cover art from `source` into `cover_path`.
///
/// Returns true when the transcoder exits cleanly and left a non-empty file.
pub async fn extract_cover(
    ffmpeg_path: &str,
    source: &Path,
    cover_path: &Path,
    timeout: Duration,
) -> bool {
    let run = Command::new(ffmpeg_path)
        .arg("-y")
        .arg("-i")
        .arg(source)
        .arg("-map")
        .arg("0:v:0")
        .arg("-frames:v")
        .arg("1")
        .arg(cover_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    let extracted = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            warn!(source = %source.display(), "cover extraction failed to spawn: {e}");
            false
        }
        Err(_) => {
            warn!(source = %source.display(), "cover extraction timed out");
            false
        }
    };

    if !extracted {
        return false;
    }

    // An empty output means the source had no embedded art stream.
    match tokio::fs::metadata(cover_path).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(cover = %cover_path.display(), bytes = meta.len(), "cover extracted");
            true
        }
        _ => {
            let _ = tokio::fs::remove_file(cover_path).await;
            false
        }
    }
}

/// Attempt to embed `cover_path` into the audiobook at `target` with the
/// external tag tool. Returns true on success.
pub async fn embed_cover(
    tag_tool_path: &str,
    target: &Path,
    cover_path: &Path,
    timeout: Duration,
) -> bool {
    if tokio::fs::metadata(cover_path).await.is_err() {
        return false;
    }

    let run = Command::new(tag_tool_path)
        .arg(target)
        .arg("--artwork")
        .arg(cover_path)
        .arg("--overWrite")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(status)) => {
            if status.success() {
                debug!(target = %target.display(), "cover embedded");
                true
            } else {
                warn!(target = %target.display(), "tag tool exited with {status}");
                false
            }
        }
        Ok(Err(e)) => {
            warn!("tag tool failed to spawn: {e}");
            false
        }
        Err(_) => {
            warn!(target = %target.display(), "cover embed timed out");
            false
        }
    }
}
