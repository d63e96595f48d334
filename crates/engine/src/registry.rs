//! Authoritative in-memory job registry.
//!
//! All job mutation funnels through [`JobRegistry::update`], keeping the map
//! single-writer behind one `RwLock`. Readers get [`JobStatusView`] clones,
//! never references into the map.

use crate::job::{Job, JobPaths, JobStatus, JobStatusView};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared registry of job-id to job state.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created job.
    pub async fn insert(&self, job: Job) {
        let mut map = self.inner.write().await;
        map.insert(job.id.clone(), job);
    }

    /// Mutate a job in place; returns the post-mutation view if the job exists.
    pub async fn update<F>(&self, id: &str, f: F) -> Option<JobStatusView>
    where
        F: FnOnce(&mut Job),
    {
        let mut map = self.inner.write().await;
        let job = map.get_mut(id)?;
        f(job);
        Some(job.to_view())
    }

    /// Record a progress value, applied only while converting and only when it
    /// strictly increases. Returns the updated view when a broadcast is due.
    pub async fn record_progress(&self, id: &str, displayed: u8) -> Option<JobStatusView> {
        let mut map = self.inner.write().await;
        let job = map.get_mut(id)?;
        if job.status != JobStatus::Converting || displayed <= job.progress {
            return None;
        }
        job.progress = displayed.min(100);
        Some(job.to_view())
    }

    pub async fn view(&self, id: &str) -> Option<JobStatusView> {
        let map = self.inner.read().await;
        map.get(id).map(Job::to_view)
    }

    pub async fn status(&self, id: &str) -> Option<JobStatus> {
        let map = self.inner.read().await;
        map.get(id).map(|j| j.status)
    }

    pub async fn paths(&self, id: &str) -> Option<JobPaths> {
        let map = self.inner.read().await;
        map.get(id).map(|j| j.paths.clone())
    }

    /// Views of all non-terminal jobs, ordered by start time.
    pub async fn active_views(&self) -> Vec<JobStatusView> {
        let map = self.inner.read().await;
        let mut views: Vec<JobStatusView> = map
            .values()
            .filter(|j| j.is_active())
            .map(Job::to_view)
            .collect();
        views.sort_by_key(|v| v.started_at_ms);
        views
    }

    /// The active job for a library item, if one exists.
    pub async fn active_view_for_item(&self, item_id: &str) -> Option<JobStatusView> {
        let map = self.inner.read().await;
        map.values()
            .find(|j| j.item_id == item_id && j.is_active())
            .map(Job::to_view)
    }

    /// Views of every job, terminal or not.
    pub async fn all_views(&self) -> Vec<JobStatusView> {
        let map = self.inner.read().await;
        let mut views: Vec<JobStatusView> = map.values().map(Job::to_view).collect();
        views.sort_by_key(|v| v.started_at_ms);
        views
    }

    /// Remove a job record entirely (reaper eviction).
    pub async fn remove(&self, id: &str) -> Option<Job> {
        let mut map = self.inner.write().await;
        map.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
