//! Job records for audiobook conversions.
//!
//! A [`Job`] tracks one conversion from admission to a terminal state. The
//! registry owns the only mutable copy; everything observable from outside
//! goes through the read-only [`JobStatusView`] projection.

use crate::runner::CancelSignal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use uuid::Uuid;

/// Status of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has been admitted but not yet dispatched.
    Starting,
    /// Job is waiting for a conversion slot.
    Queued,
    /// Job is running the transcode or one of the commit steps.
    Converting,
    /// Job committed successfully.
    Completed,
    /// Job failed; `error` carries the reason.
    Failed,
    /// Job was cancelled before or during the transcode.
    Cancelled,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Converting => write!(f, "converting"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStatus {
    /// Check if the status is terminal (completed, failed, or cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check if the status is active (starting, queued, or converting).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One source audio file feeding a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Full path to the source audio file.
    pub path: PathBuf,
    /// Duration in seconds, when known from the library's metadata.
    pub duration_secs: Option<f64>,
    /// Display title; becomes the chapter title for multi-file jobs.
    pub title: String,
}

/// Filesystem locations a job works with, all derived up front from the
/// sanitized item title and the shared temp directory.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPaths {
    /// Transcode target inside the temp directory.
    pub temp_output: PathBuf,
    /// Final location inside the library item's directory.
    pub final_output: PathBuf,
    /// Extracted cover image, if any.
    pub temp_cover: PathBuf,
    /// Concat list side file.
    pub concat_list: PathBuf,
    /// Synthesized chapter metadata side file.
    pub chapter_metadata: PathBuf,
}

impl JobPaths {
    /// Derive all working paths for an item titled `title`, converting into
    /// `library_dir` via `temp_dir`.
    pub fn derive(title: &str, temp_dir: &Path, library_dir: &Path) -> Self {
        let safe = sanitize_title(title);
        Self {
            temp_output: temp_dir.join(format!("{}.m4b", safe)),
            final_output: library_dir.join(format!("{}.m4b", safe)),
            temp_cover: temp_dir.join(format!("{}.cover.jpg", safe)),
            concat_list: temp_dir.join(format!("{}.concat.txt", safe)),
            chapter_metadata: temp_dir.join(format!("{}.chapters.txt", safe)),
        }
    }

    /// Directory the final output lands in; locked for the job's lifetime.
    pub fn library_dir(&self) -> PathBuf {
        self.final_output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// Characters stripped from titles before they become file names.
const UNSAFE_TITLE_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Sanitizes an item title into a filesystem-safe file stem.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if UNSAFE_TITLE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A conversion job owned by the registry.
#[derive(Debug)]
pub struct Job {
    /// Unique job identifier (UUID), never reused.
    pub id: String,
    /// Library item being converted.
    pub item_id: String,
    /// Item title, for reporting.
    pub item_title: String,
    /// Current status in the state machine.
    pub status: JobStatus,
    /// 0-100, non-decreasing while converting.
    pub progress: u8,
    /// Human-readable current activity.
    pub message: String,
    /// Failure reason, present only when status is `Failed`.
    pub error: Option<String>,
    /// Ordered source files; length 1 for single-file jobs.
    pub source_files: Vec<SourceFile>,
    /// Selects the concatenation strategy in the argument builder.
    pub is_multi_file: bool,
    /// All derived working paths.
    pub paths: JobPaths,
    /// Signal into the running transcode, set while a process is live.
    pub cancel: Option<watch::Sender<CancelSignal>>,
    /// Unix timestamp (milliseconds) when the job was created.
    pub started_at_ms: i64,
    /// Unix timestamp (milliseconds) when the job reached a terminal state.
    pub completed_at_ms: Option<i64>,
}

impl Job {
    /// Create a new job in the `Starting` state.
    pub fn new(
        item_id: String,
        item_title: String,
        source_files: Vec<SourceFile>,
        paths: JobPaths,
    ) -> Self {
        let is_multi_file = source_files.len() > 1;
        Self {
            id: Uuid::new_v4().to_string(),
            item_id,
            item_title,
            status: JobStatus::Starting,
            progress: 0,
            message: "Preparing conversion".to_string(),
            error: None,
            source_files,
            is_multi_file,
            paths,
            cancel: None,
            started_at_ms: current_timestamp_ms(),
            completed_at_ms: None,
        }
    }

    /// Set the status and activity message, stamping terminal transitions.
    pub fn set_status(&mut self, status: JobStatus, message: impl Into<String>) {
        // Terminal states are sticky; only the reaper removes the record.
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.message = message.into();
        if status.is_terminal() && self.completed_at_ms.is_none() {
            self.completed_at_ms = Some(current_timestamp_ms());
        }
    }

    /// Mark the job as failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let reason = reason.into();
        self.error = Some(reason.clone());
        self.set_status(JobStatus::Failed, reason);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Read-only projection for callers and the notification channel.
    pub fn to_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id.clone(),
            item_id: self.item_id.clone(),
            item_title: self.item_title.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
            source_files: self.source_files.clone(),
            is_multi_file: self.is_multi_file,
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
        }
    }
}

/// Read-only projection of a [`Job`], omitting the process handle and paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: String,
    pub item_id: String,
    pub item_title: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub source_files: Vec<SourceFile>,
    pub is_multi_file: bool,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
}

/// Get current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sources(paths: &[&str]) -> Vec<SourceFile> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| SourceFile {
                path: PathBuf::from(p),
                duration_secs: Some(60.0),
                title: format!("Chapter {}", i + 1),
            })
            .collect()
    }

    fn make_job(paths: &[&str]) -> Job {
        let job_paths = JobPaths::derive(
            "My Book",
            Path::new("/tmp/m4b-engine"),
            Path::new("/library/My Book"),
        );
        Job::new(
            "item-1".to_string(),
            "My Book".to_string(),
            make_sources(paths),
            job_paths,
        )
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", JobStatus::Starting), "starting");
        assert_eq!(format!("{}", JobStatus::Queued), "queued");
        assert_eq!(format!("{}", JobStatus::Converting), "converting");
        assert_eq!(format!("{}", JobStatus::Completed), "completed");
        assert_eq!(format!("{}", JobStatus::Failed), "failed");
        assert_eq!(format!("{}", JobStatus::Cancelled), "cancelled");
    }

    #[test]
    fn test_status_terminal_and_active() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Starting.is_active());
        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Converting.is_active());
    }

    #[test]
    fn test_new_job_initial_state() {
        let job = make_job(&["/library/My Book/a.mp3"]);

        assert_eq!(job.id.len(), 36);
        assert!(job.id.contains('-'));
        assert_eq!(job.status, JobStatus::Starting);
        assert_eq!(job.progress, 0);
        assert!(!job.is_multi_file);
        assert!(job.error.is_none());
        assert!(job.cancel.is_none());
        assert!(job.started_at_ms > 0);
        assert!(job.completed_at_ms.is_none());
    }

    #[test]
    fn test_multi_file_flag_from_source_count() {
        let single = make_job(&["/library/My Book/a.mp3"]);
        let multi = make_job(&["/library/My Book/a.mp3", "/library/My Book/b.mp3"]);
        assert!(!single.is_multi_file);
        assert!(multi.is_multi_file);
    }

    #[test]
    fn test_fail_sets_error_and_timestamp() {
        let mut job = make_job(&["/library/My Book/a.mp3"]);
        job.fail("ffmpeg exited with code 1");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("ffmpeg exited with code 1"));
        assert!(job.completed_at_ms.is_some());
    }

    #[test]
    fn test_terminal_status_sticky() {
        let mut job = make_job(&["/library/My Book/a.mp3"]);
        job.set_status(JobStatus::Cancelled, "Cancelled");
        let first = job.completed_at_ms;

        // A late failure must not overwrite an already-terminal record.
        job.fail("late failure");
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.completed_at_ms, first);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_view_omits_internal_fields() {
        let mut job = make_job(&["/library/My Book/a.mp3"]);
        job.progress = 42;
        let view = job.to_view();

        assert_eq!(view.id, job.id);
        assert_eq!(view.progress, 42);
        assert_eq!(view.source_files.len(), 1);

        // Serialized view carries no path or process internals.
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("temp_output"));
        assert!(!json.contains("cancel"));
    }

    #[test]
    fn test_paths_derived_from_sanitized_title() {
        let paths = JobPaths::derive(
            "Book: a/b?",
            Path::new("/tmp/work"),
            Path::new("/library/item"),
        );
        assert_eq!(paths.temp_output, PathBuf::from("/tmp/work/Book_ a_b_.m4b"));
        assert_eq!(
            paths.final_output,
            PathBuf::from("/library/item/Book_ a_b_.m4b")
        );
        assert_eq!(paths.library_dir(), PathBuf::from("/library/item"));
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Plain Title"), "Plain Title");
        assert_eq!(sanitize_title("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_title("  trimmed  "), "trimmed");
        assert_eq!(sanitize_title("..."), "untitled");
        assert_eq!(sanitize_title(""), "untitled");
    }

    #[test]
    fn test_view_serialization_round_trip() {
        let job = make_job(&["/library/My Book/a.mp3", "/library/My Book/b.mp3"]);
        let view = job.to_view();
        let json = serde_json::to_string(&view).unwrap();
        let back: JobStatusView = serde_json::from_str(&json).unwrap();
        assert_eq!(view, back);
    }
}
