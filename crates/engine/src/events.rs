//! Publish-only notification channel.
//!
//! Job lifecycle edges and library mutations are broadcast to whoever is
//! listening. Publishing is fire-and-forget: with no subscribers the send
//! result is ignored, and a slow subscriber only loses its own backlog.

use crate::job::JobStatusView;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// An event published by the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A job changed status, progress, or message.
    JobStatus { job: JobStatusView },
    /// The library contents changed for an item (conversion committed).
    LibraryChanged { item_id: String },
}

/// Broadcast fan-out for engine events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn job_status(&self, job: JobStatusView) {
        let _ = self.sender.send(EngineEvent::JobStatus { job });
    }

    pub fn library_changed(&self, item_id: impl Into<String>) {
        let _ = self.sender.send(EngineEvent::LibraryChanged {
            item_id: item_id.into(),
        });
    }
}
