//! Transcoder process runner.
//!
//! Spawns the external transcoder, streams both of its output pipes through
//! the progress parser, and races the wait against a cancellation channel so
//! a job can be aborted or timed out mid-encode.

use crate::args::ConversionPlan;
use crate::progress::ProgressParser;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Signal delivered to a running job through its cancellation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelSignal {
    /// No cancellation requested.
    #[default]
    None,
    /// Explicit cancellation by a caller.
    Cancel,
    /// Forced termination by the stale-job reaper.
    Timeout,
}

/// How a transcoder run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited successfully.
    Completed,
    /// The process was killed after an explicit cancel.
    Cancelled,
    /// The process was killed by the reaper's timeout.
    TimedOut,
}

/// Error type for transcoder process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The transcoder exited with a non-zero status code.
    #[error("transcoder failed with exit code {code}: {detail}")]
    TranscoderFailed { code: i32, detail: String },

    /// The transcoder was terminated by a signal.
    #[error("transcoder was terminated by a signal")]
    TranscoderTerminated,

    /// The transcoder binary could not be found or executed.
    #[error("transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    /// IO error spawning or reading from the process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Verify the transcoder binary responds before accepting any jobs.
pub async fn check_transcoder_available(ffmpeg_path: &str) -> Result<(), ProcessError> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| ProcessError::TranscoderUnavailable(format!("{ffmpeg_path}: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ProcessError::TranscoderUnavailable(format!(
            "{ffmpeg_path} exited with {}",
            output.status
        )))
    }
}

/// Run the transcoder for a conversion plan.
///
/// Side files named by the plan are written before the process is spawned.
/// Progress percentages (already remapped into the job's transcode window)
/// are delivered through `on_progress`. The run is aborted when the
/// cancellation channel switches away from [`CancelSignal::None`]; the child
/// is killed and the matching outcome returned.
pub async fn run_transcode<F>(
    ffmpeg_path: &str,
    plan: &ConversionPlan,
    mut cancel_rx: watch::Receiver<CancelSignal>,
    mut on_progress: F,
) -> Result<RunOutcome, ProcessError>
where
    F: FnMut(u8),
{
    for side_file in &plan.side_files {
        if let Some(parent) = side_file.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&side_file.path, &side_file.contents).await?;
    }

    let mut child = Command::new(ffmpeg_path)
        .args(&plan.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProcessError::TranscoderUnavailable(format!("{ffmpeg_path}: {e}"))
            }
            _ => ProcessError::Io(e),
        })?;

    // Piped stdout/stderr are always present after spawn.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("transcoder stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("transcoder stderr not captured"))?;

    let mut progress_lines = BufReader::new(stdout).lines();
    let mut diagnostic_lines = BufReader::new(stderr).lines();

    let mut parser = ProgressParser::new();
    // Keep the tail of the diagnostic stream for error reporting.
    let mut diagnostic_tail: Vec<String> = Vec::new();

    let mut progress_done = false;
    let mut diagnostics_done = false;

    let status = loop {
        tokio::select! {
            line = progress_lines.next_line(), if !progress_done => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(pct) = parser.observe_progress_line(&line) {
                            on_progress(pct);
                        }
                    }
                    _ => progress_done = true,
                }
            }
            line = diagnostic_lines.next_line(), if !diagnostics_done => {
                match line {
                    Ok(Some(line)) => {
                        parser.observe_diagnostic_line(&line);
                        if diagnostic_tail.len() >= 20 {
                            diagnostic_tail.remove(0);
                        }
                        diagnostic_tail.push(line);
                    }
                    _ => diagnostics_done = true,
                }
            }
            changed = cancel_rx.changed() => {
                let signal = if changed.is_ok() {
                    *cancel_rx.borrow_and_update()
                } else {
                    // Sender dropped: the job was abandoned, treat as cancel.
                    CancelSignal::Cancel
                };
                if signal != CancelSignal::None {
                    debug!(?signal, "killing transcoder process");
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill transcoder: {e}");
                    }
                    let _ = child.wait().await;
                    return Ok(match signal {
                        CancelSignal::Timeout => RunOutcome::TimedOut,
                        _ => RunOutcome::Cancelled,
                    });
                }
            }
            status = child.wait() => {
                break status?;
            }
        }
    };

    // Drain any buffered diagnostics so failures carry useful context.
    while let Ok(Some(line)) = diagnostic_lines.next_line().await {
        if diagnostic_tail.len() >= 20 {
            diagnostic_tail.remove(0);
        }
        diagnostic_tail.push(line);
    }

    if status.success() {
        Ok(RunOutcome::Completed)
    } else {
        match status.code() {
            Some(code) => Err(ProcessError::TranscoderFailed {
                code,
                detail: diagnostic_tail
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "no diagnostic output".to_string()),
            }),
            None => Err(ProcessError::TranscoderTerminated),
        }
    }
}

/// Probe a source file's duration in seconds via a decode-to-null run.
///
/// Used when the caller did not supply durations for chapter generation.
pub async fn probe_duration_secs(
    ffmpeg_path: &str,
    source: &Path,
) -> Result<Option<f64>, ProcessError> {
    let output = Command::new(ffmpeg_path)
        .arg("-hide_banner")
        .arg("-i")
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    // ffmpeg exits non-zero without an output target; the banner on stderr
    // still carries the duration line.
    let mut parser = ProgressParser::new();
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        parser.observe_diagnostic_line(line);
    }
    Ok(parser.total_duration_secs())
}
