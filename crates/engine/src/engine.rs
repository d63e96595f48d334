//! Conversion engine.
//!
//! Public surface tying the pieces together: admission validation, job
//! creation, the per-job driver task, cancellation, and shutdown. Callers
//! observe asynchronous failure exclusively through job state and the event
//! channel; `start_conversion` itself surfaces only the narrow synchronous
//! validation errors.

use crate::args::build_conversion_plan;
use crate::commit::{self, CommitSettings};
use crate::cover;
use crate::events::{EngineEvent, EventPublisher};
use crate::job::{Job, JobPaths, JobStatus, JobStatusView, SourceFile};
use crate::limiter::ConversionSlots;
use crate::locks::DirectoryLockSet;
use crate::reaper::{self, ReaperContext, ReaperSettings, TIMEOUT_ERROR};
use crate::registry::JobRegistry;
use crate::runner::{self, CancelSignal, RunOutcome};
use crate::store::LibraryStore;
use crate::validate::{self, ValidationError};
use m4b_engine_config::Config;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything the engine needs to know at construction time.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ffmpeg_path: String,
    pub tag_tool_path: String,
    pub temp_dir: PathBuf,
    /// Raw configured value; 0 auto-derives from core count.
    pub max_concurrent_jobs: u32,
    pub cover_extract_timeout: Duration,
    pub cover_embed_timeout: Duration,
    pub reaper: ReaperSettings,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.conversion.ffmpeg_path.clone(),
            tag_tool_path: config.conversion.tag_tool_path.clone(),
            temp_dir: config.paths.temp_dir.clone(),
            max_concurrent_jobs: config.conversion.max_concurrent_jobs,
            cover_extract_timeout: Duration::from_secs(config.cover.extract_timeout_secs),
            cover_embed_timeout: Duration::from_secs(config.cover.embed_timeout_secs),
            reaper: ReaperSettings {
                sweep_interval: Duration::from_secs(config.reaper.sweep_interval_secs),
                retention: Duration::from_secs(config.reaper.retention_secs),
                stuck_after: Duration::from_secs(config.reaper.stuck_after_secs),
            },
        }
    }
}

/// A conversion request from the caller.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub item_id: String,
    pub item_title: String,
    pub sources: Vec<SourceFile>,
}

struct EngineInner {
    settings: EngineSettings,
    registry: JobRegistry,
    slots: ConversionSlots,
    locks: Arc<DirectoryLockSet>,
    events: EventPublisher,
    store: Arc<dyn LibraryStore>,
    shutdown_tx: watch::Sender<bool>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
    driver_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// The audiobook conversion job engine.
#[derive(Clone)]
pub struct ConversionEngine {
    inner: Arc<EngineInner>,
}

impl ConversionEngine {
    /// Build the engine and start its background reaper task.
    pub fn new(settings: EngineSettings, store: Arc<dyn LibraryStore>) -> Self {
        let registry = JobRegistry::new();
        let slots = ConversionSlots::new(crate::limiter::derive_slots(
            settings.max_concurrent_jobs,
        ));
        let locks = Arc::new(DirectoryLockSet::new());
        let events = EventPublisher::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reaper_ctx = ReaperContext {
            registry: registry.clone(),
            locks: locks.clone(),
            events: events.clone(),
            settings: settings.reaper.clone(),
        };
        let reaper_handle = tokio::spawn(reaper::run_reaper(reaper_ctx, shutdown_rx));

        info!(
            slots = slots.capacity(),
            temp_dir = %settings.temp_dir.display(),
            "conversion engine started"
        );

        Self {
            inner: Arc::new(EngineInner {
                settings,
                registry,
                slots,
                locks,
                events,
                store,
                shutdown_tx,
                reaper_handle: Mutex::new(Some(reaper_handle)),
                driver_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Validate and admit a conversion. On success the job is created,
    /// its library directory locked, and a driver task spawned; the
    /// returned view is the job's initial state.
    pub async fn start_conversion(
        &self,
        request: ConversionRequest,
    ) -> Result<JobStatusView, ValidationError> {
        validate::validate_sources(&request.sources)?;

        if self
            .inner
            .registry
            .active_view_for_item(&request.item_id)
            .await
            .is_some()
        {
            return Err(ValidationError::AlreadyActive(request.item_id));
        }

        // The final output lands next to the first source file.
        let library_dir = request.sources[0]
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let paths = JobPaths::derive(
            &request.item_title,
            &self.inner.settings.temp_dir,
            &library_dir,
        );

        let job = Job::new(
            request.item_id,
            request.item_title,
            request.sources,
            paths,
        );
        let job_id = job.id.clone();
        let view = job.to_view();

        self.inner.locks.lock(&library_dir);
        self.inner.registry.insert(job).await;
        self.inner.events.job_status(view.clone());

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            engine.drive(job_id).await;
        });
        if let Ok(mut handles) = self.inner.driver_handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }

        Ok(view)
    }

    pub async fn job_status(&self, job_id: &str) -> Option<JobStatusView> {
        self.inner.registry.view(job_id).await
    }

    pub async fn active_jobs(&self) -> Vec<JobStatusView> {
        self.inner.registry.active_views().await
    }

    pub async fn active_job_for_item(&self, item_id: &str) -> Option<JobStatusView> {
        self.inner.registry.active_view_for_item(item_id).await
    }

    /// Whether a library directory currently has a conversion in flight.
    pub fn is_directory_locked(&self, dir: &Path) -> bool {
        self.inner.locks.is_locked(dir)
    }

    /// Subscribe to job-status and library-changed events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Handle to the registry, for the status server.
    pub fn registry(&self) -> JobRegistry {
        self.inner.registry.clone()
    }

    /// Handle to the concurrency limiter, for the status server.
    pub fn slots(&self) -> ConversionSlots {
        self.inner.slots.clone()
    }

    /// Cancel a job. Running jobs are signalled and their process killed by
    /// the driver; queued and starting jobs are cancelled in place. Returns
    /// false when the job is unknown, already terminal, or past the point of
    /// no return (its transcode finished and the commit is in flight).
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        let mut signalled = false;
        let mut cancelled_in_place = false;
        let mut committing = false;
        let updated = self
            .inner
            .registry
            .update(job_id, |job| {
                if job.is_terminal() {
                    return;
                }
                if let Some(cancel) = &job.cancel {
                    signalled = cancel.send(CancelSignal::Cancel).is_ok();
                }
                if signalled {
                    return;
                }
                if job.status == JobStatus::Converting {
                    // A converting job without a live handle is committing;
                    // its output is being moved into place and the store
                    // transaction may already be under way.
                    committing = true;
                    return;
                }
                job.set_status(JobStatus::Cancelled, "Conversion cancelled");
                cancelled_in_place = true;
            })
            .await;

        let Some(view) = updated else {
            return false;
        };

        if committing {
            info!(job_id, "cancel refused, commit already in progress");
            return false;
        }

        if cancelled_in_place {
            // The driver never ran (or already exited): finish its cleanup.
            if let Some(paths) = self.inner.registry.paths(job_id).await {
                commit::cleanup_temp_files(&paths).await;
                self.inner.locks.unlock(&paths.library_dir());
            }
            self.inner.events.job_status(view);
            info!(job_id, "job cancelled while waiting");
            return true;
        }

        signalled
    }

    /// Stop the engine: halt the reaper, cancel all active jobs, and wait a
    /// bounded time for driver tasks to unwind.
    pub async fn shutdown(&self) {
        info!("conversion engine shutting down");
        let _ = self.inner.shutdown_tx.send(true);

        for view in self.inner.registry.active_views().await {
            self.cancel_job(&view.id).await;
        }

        let handles: Vec<JoinHandle<()>> = self
            .inner
            .driver_handles
            .lock()
            .map(|mut h| h.drain(..).collect())
            .unwrap_or_default();
        for handle in handles {
            if tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .is_err()
            {
                warn!("driver task did not unwind in time");
            }
        }

        let reaper_handle = self
            .inner
            .reaper_handle
            .lock()
            .ok()
            .and_then(|mut h| h.take());
        if let Some(handle) = reaper_handle {
            let _ = handle.await;
        }
    }

    /// Per-job driver: waits for a slot, runs extraction, transcode, and
    /// finalize, and resolves every failure into job state.
    async fn drive(&self, job_id: String) {
        let inner = &self.inner;

        if inner.slots.is_saturated() {
            let message = format!("Waiting for a free slot ({})", inner.slots.occupancy());
            if let Some(view) = inner
                .registry
                .update(&job_id, |job| job.set_status(JobStatus::Queued, message))
                .await
            {
                inner.events.job_status(view);
            }
        }

        let token = inner.slots.acquire().await;

        // Install the cancellation handle and claim the slot atomically with
        // the status check, so a cancel that landed while queued wins.
        let (cancel_tx, cancel_rx) = watch::channel(CancelSignal::None);
        let mut already_terminal = false;
        let claimed = inner
            .registry
            .update(&job_id, |job| {
                if job.is_terminal() {
                    already_terminal = true;
                    return;
                }
                job.cancel = Some(cancel_tx);
                job.progress = 5;
                job.set_status(JobStatus::Converting, "Extracting cover art");
            })
            .await;
        if already_terminal || claimed.is_none() {
            drop(token);
            return;
        }
        if let Some(view) = claimed {
            inner.events.job_status(view);
        }

        let Some(paths) = inner.registry.paths(&job_id).await else {
            drop(token);
            return;
        };
        let Some(snapshot) = inner.registry.view(&job_id).await else {
            drop(token);
            return;
        };

        if let Err(e) = tokio::fs::create_dir_all(&inner.settings.temp_dir).await {
            self.fail_job(&job_id, &paths, format!("temp directory unavailable: {e}"))
                .await;
            drop(token);
            return;
        }

        let cover_ok = cover::extract_cover(
            &inner.settings.ffmpeg_path,
            &snapshot.source_files[0].path,
            &paths.temp_cover,
            inner.settings.cover_extract_timeout,
        )
        .await;
        if let Some(view) = inner.registry.record_progress(&job_id, 10).await {
            inner.events.job_status(view);
        }

        let sources = self.resolve_durations(snapshot.source_files.clone()).await;
        let plan = build_conversion_plan(&sources, snapshot.is_multi_file, &paths);

        // Progress callbacks are synchronous; forward them through a channel
        // into the async registry.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let forwarder = {
            let registry = inner.registry.clone();
            let events = inner.events.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(pct) = progress_rx.recv().await {
                    if let Some(view) = registry.record_progress(&job_id, pct).await {
                        events.job_status(view);
                    }
                }
            })
        };

        let outcome = runner::run_transcode(
            &inner.settings.ffmpeg_path,
            &plan,
            cancel_rx,
            move |pct| {
                let _ = progress_tx.send(pct);
            },
        )
        .await;
        forwarder.await.ok();

        // The process is gone. Retire the handle, and honor any signal that
        // landed after the wait resolved so a late cancel cannot slip into
        // the commit below.
        let mut late_signal = CancelSignal::None;
        inner
            .registry
            .update(&job_id, |job| {
                if let Some(cancel) = job.cancel.take() {
                    late_signal = *cancel.borrow();
                }
            })
            .await;
        let outcome = match (outcome, late_signal) {
            (Ok(RunOutcome::Completed), CancelSignal::Cancel) => Ok(RunOutcome::Cancelled),
            (Ok(RunOutcome::Completed), CancelSignal::Timeout) => Ok(RunOutcome::TimedOut),
            (outcome, _) => outcome,
        };

        match outcome {
            Ok(RunOutcome::Completed) => {
                if let Some(view) = inner
                    .registry
                    .update(&job_id, |job| {
                        if job.is_terminal() {
                            return;
                        }
                        job.progress = 90;
                        job.message = "Finalizing audiobook".to_string();
                    })
                    .await
                {
                    inner.events.job_status(view);
                }

                let settings = CommitSettings {
                    tag_tool_path: inner.settings.tag_tool_path.clone(),
                    embed_timeout: inner.settings.cover_embed_timeout,
                };
                let result = commit::finalize_conversion(
                    &paths,
                    &snapshot.item_id,
                    &sources,
                    cover_ok,
                    &settings,
                    &inner.store,
                )
                .await;

                match result {
                    Ok(_) => {
                        commit::cleanup_temp_files(&paths).await;
                        inner.locks.unlock(&paths.library_dir());
                        if let Some(view) = inner
                            .registry
                            .update(&job_id, |job| {
                                if job.is_terminal() {
                                    return;
                                }
                                job.progress = 100;
                                job.set_status(JobStatus::Completed, "Conversion complete");
                            })
                            .await
                        {
                            inner.events.job_status(view);
                        }
                        inner.events.library_changed(&snapshot.item_id);
                    }
                    Err(e) => self.fail_job(&job_id, &paths, e.to_string()).await,
                }
            }
            Ok(RunOutcome::Cancelled) => {
                commit::cleanup_temp_files(&paths).await;
                inner.locks.unlock(&paths.library_dir());
                if let Some(view) = inner
                    .registry
                    .update(&job_id, |job| {
                        job.set_status(JobStatus::Cancelled, "Conversion cancelled")
                    })
                    .await
                {
                    inner.events.job_status(view);
                }
                info!(job_id, "conversion cancelled");
            }
            Ok(RunOutcome::TimedOut) => {
                self.fail_job(&job_id, &paths, TIMEOUT_ERROR).await;
            }
            Err(e) => {
                self.fail_job(&job_id, &paths, e.to_string()).await;
            }
        }

        drop(token);
    }

    /// Fill in missing source durations by probing, so multi-file chapter
    /// offsets stay accurate when the caller's metadata is incomplete.
    async fn resolve_durations(&self, mut sources: Vec<SourceFile>) -> Vec<SourceFile> {
        if sources.len() < 2 {
            return sources;
        }
        for source in &mut sources {
            if source.duration_secs.is_some() {
                continue;
            }
            match runner::probe_duration_secs(&self.inner.settings.ffmpeg_path, &source.path).await
            {
                Ok(d) => source.duration_secs = d,
                Err(e) => warn!(source = %source.path.display(), "duration probe failed: {e}"),
            }
        }
        sources
    }

    /// Common failure path: terminal `failed`, temp cleanup that never
    /// touches sources, lock release, and an event.
    async fn fail_job(&self, job_id: &str, paths: &JobPaths, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(job_id, "conversion failed: {reason}");
        commit::cleanup_temp_files(paths).await;
        self.inner.locks.unlock(&paths.library_dir());
        if let Some(view) = self
            .inner
            .registry
            .update(job_id, |job| job.fail(reason))
            .await
        {
            self.inner.events.job_status(view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConversionCommit, LibraryStore, MemoryStore, StoreError};
    use crate::validate::ValidationError;
    use std::fs;

    /// Store whose commit blocks long enough for the commit window to be
    /// observed from the outside.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl LibraryStore for SlowStore {
        async fn commit_conversion(&self, commit: ConversionCommit) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.commit_conversion(commit).await
        }
    }

    fn test_settings(temp_dir: &Path) -> EngineSettings {
        EngineSettings {
            // A shell stub that reads no input and writes a fixed output
            // lets the full pipeline run without a real transcoder.
            ffmpeg_path: "true".to_string(),
            tag_tool_path: "true".to_string(),
            temp_dir: temp_dir.to_path_buf(),
            max_concurrent_jobs: 2,
            cover_extract_timeout: Duration::from_secs(5),
            cover_embed_timeout: Duration::from_secs(5),
            reaper: ReaperSettings {
                sweep_interval: Duration::from_secs(300),
                retention: Duration::from_secs(3600),
                stuck_after: Duration::from_secs(7200),
            },
        }
    }

    fn engine_in(dir: &Path) -> (ConversionEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = ConversionEngine::new(test_settings(dir), store.clone());
        (engine, store)
    }

    fn request_with_source(dir: &Path, name: &str) -> ConversionRequest {
        let library = dir.join("library/Book");
        fs::create_dir_all(&library).unwrap();
        let path = library.join(name);
        fs::write(&path, b"audio").unwrap();
        ConversionRequest {
            item_id: "item-1".to_string(),
            item_title: "Book".to_string(),
            sources: vec![SourceFile {
                path,
                duration_secs: Some(10.0),
                title: "Chapter 1".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_rejects_single_m4b() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        let request = request_with_source(dir.path(), "book.m4b");

        let err = engine.start_conversion(request).await.unwrap_err();
        assert!(matches!(err, ValidationError::AlreadyConverted));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejects_second_job_for_same_item() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());

        let first = request_with_source(dir.path(), "01.mp3");
        let view = engine.start_conversion(first.clone()).await.unwrap();
        assert_eq!(view.item_id, "item-1");

        let err = engine.start_conversion(first).await.unwrap_err();
        assert!(matches!(err, ValidationError::AlreadyActive(id) if id == "item-1"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_directory_locked_for_job_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        let request = request_with_source(dir.path(), "01.mp3");
        let library_dir = request.sources[0].path.parent().unwrap().to_path_buf();

        engine.start_conversion(request).await.unwrap();
        assert!(engine.is_directory_locked(&library_dir));

        engine.shutdown().await;
        assert!(!engine.is_directory_locked(&library_dir));
    }

    #[tokio::test]
    async fn test_failed_transcode_resolves_into_job_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.ffmpeg_path = "false".to_string();
        let engine = ConversionEngine::new(settings, Arc::new(MemoryStore::new()));

        let request = request_with_source(dir.path(), "01.mp3");
        let source = request.sources[0].path.clone();
        let view = engine.start_conversion(request).await.unwrap();

        let status = loop {
            match engine.job_status(&view.id).await {
                Some(v) if v.status.is_terminal() => break v,
                _ => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
        };

        assert_eq!(status.status, JobStatus::Failed);
        assert!(status.error.is_some());
        assert!(source.exists(), "failure must never delete sources");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        assert!(!engine.cancel_job("no-such-job").await);
        engine.shutdown().await;
    }

    /// Transcoder stand-in that writes its final argument, so the commit
    /// phase finds a real output file.
    #[cfg(unix)]
    fn write_output_stub(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let stub = dir.join("stub-ffmpeg");
        fs::write(
            &stub,
            "#!/bin/sh\nfor last; do :; done\nprintf audio > \"$last\"\n",
        )
        .unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        stub
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_refused_once_commit_started() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.ffmpeg_path = write_output_stub(dir.path()).display().to_string();
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_secs(2),
        });
        let engine = ConversionEngine::new(settings, store.clone());

        let request = request_with_source(dir.path(), "01.mp3");
        let source = request.sources[0].path.clone();
        let view = engine.start_conversion(request).await.unwrap();

        // Wait for the driver to enter the finalize phase.
        for _ in 0..500 {
            if engine.job_status(&view.id).await.map(|v| v.progress) == Some(90) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            engine.job_status(&view.id).await.map(|v| v.progress),
            Some(90)
        );

        // The transcode handle is retired and the store write is in flight;
        // the cancel must be refused instead of racing the commit.
        assert!(!engine.cancel_job(&view.id).await);

        let status = loop {
            match engine.job_status(&view.id).await {
                Some(v) if v.status.is_terminal() => break v,
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        };
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(store.inner.commits().len(), 1);
        assert!(!source.exists(), "replaced sources are removed on commit");
        engine.shutdown().await;
    }

    /// Write a slow shell stub standing in for the transcoder, so one job
    /// can hold a slot long enough for another to be observed queued.
    #[cfg(unix)]
    fn write_slow_stub(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let stub = dir.join("slow-ffmpeg");
        fs::write(&stub, "#!/bin/sh\nsleep 10\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        stub
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_queued_job_never_converts() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.max_concurrent_jobs = 1;
        settings.cover_extract_timeout = Duration::from_millis(200);
        settings.ffmpeg_path = write_slow_stub(dir.path()).display().to_string();
        let engine = ConversionEngine::new(settings, Arc::new(MemoryStore::new()));

        let mut blocker = request_with_source(dir.path(), "01.mp3");
        blocker.item_id = "item-blocker".to_string();
        let _blocker = engine.start_conversion(blocker).await.unwrap();

        let mut queued = request_with_source(dir.path(), "02.mp3");
        queued.item_id = "item-queued".to_string();
        queued.item_title = "Other Book".to_string();
        let queued_view = engine.start_conversion(queued).await.unwrap();

        // Wait until the second job is parked in the queue.
        for _ in 0..200 {
            if engine.job_status(&queued_view.id).await.map(|v| v.status)
                == Some(JobStatus::Queued)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            engine.job_status(&queued_view.id).await.map(|v| v.status),
            Some(JobStatus::Queued)
        );

        assert!(engine.cancel_job(&queued_view.id).await);
        let status = engine.job_status(&queued_view.id).await.unwrap();
        assert_eq!(status.status, JobStatus::Cancelled);

        // The job must stay cancelled even once a slot would be granted.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = engine.job_status(&queued_view.id).await.unwrap();
        assert_eq!(status.status, JobStatus::Cancelled);
        engine.shutdown().await;
    }
}
