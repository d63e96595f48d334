//! Stale job reaper.
//!
//! A periodic sweep over the registry that evicts terminal jobs past their
//! retention window and force-fails jobs stuck beyond the runaway threshold.
//! The reaper is the backstop guaranteeing every job reaches a terminal
//! state even when its process hangs indefinitely.

use crate::commit;
use crate::events::EventPublisher;
use crate::job::current_timestamp_ms;
use crate::locks::DirectoryLockSet;
use crate::registry::JobRegistry;
use crate::runner::CancelSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Fixed error recorded on force-failed jobs.
pub const TIMEOUT_ERROR: &str = "Conversion timed out";

/// Timing knobs for the sweep.
#[derive(Debug, Clone)]
pub struct ReaperSettings {
    pub sweep_interval: Duration,
    /// Terminal jobs older than this are evicted from the registry.
    pub retention: Duration,
    /// Non-terminal jobs older than this are force-failed.
    pub stuck_after: Duration,
}

/// Shared state the sweep operates on.
#[derive(Clone)]
pub struct ReaperContext {
    pub registry: JobRegistry,
    pub locks: Arc<DirectoryLockSet>,
    pub events: EventPublisher,
    pub settings: ReaperSettings,
}

/// One sweep pass at the given clock reading (injectable for tests).
pub async fn sweep_stale_jobs(ctx: &ReaperContext, now_ms: i64) {
    let retention_ms = ctx.settings.retention.as_millis() as i64;
    let stuck_ms = ctx.settings.stuck_after.as_millis() as i64;

    for view in ctx.registry.all_views().await {
        if view.status.is_terminal() {
            // Retention is measured from the job's start, so a record's
            // lifetime is bounded regardless of how long it ran.
            if now_ms - view.started_at_ms >= retention_ms {
                debug!(job_id = %view.id, "evicting expired job record");
                ctx.registry.remove(&view.id).await;
            }
            continue;
        }

        if now_ms - view.started_at_ms < stuck_ms {
            continue;
        }

        warn!(job_id = %view.id, item = %view.item_title, "force-failing stuck job");

        // A running job has a cancellation handle; signalling it lets the
        // driver task kill the process and run the normal failure path.
        let mut signalled = false;
        ctx.registry
            .update(&view.id, |job| {
                if let Some(cancel) = &job.cancel {
                    signalled = cancel.send(CancelSignal::Timeout).is_ok();
                }
            })
            .await;
        if signalled {
            continue;
        }

        // No live driver to react: fail the record directly and run the
        // same cleanup a normal failure would.
        let updated = ctx
            .registry
            .update(&view.id, |job| job.fail(TIMEOUT_ERROR))
            .await;
        if let Some(job_view) = updated {
            if let Some(paths) = ctx.registry.paths(&view.id).await {
                commit::cleanup_temp_files(&paths).await;
                ctx.locks.unlock(&paths.library_dir());
            }
            ctx.events.job_status(job_view);
        }
    }
}

/// Run the sweep on an interval until shutdown is signalled.
pub async fn run_reaper(ctx: ReaperContext, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(ctx.settings.sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a fresh engine does not
    // sweep an empty registry at startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_stale_jobs(&ctx, current_timestamp_ms()).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("reaper shutting down");
                    return;
                }
            }
        }
    }
}
