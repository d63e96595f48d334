//! Bounded conversion slots with FIFO admission.
//!
//! Wraps a fair tokio `Semaphore`: waiters are granted permits in arrival
//! order, so queued jobs start converting in the order they were submitted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default slot count when the configuration does not pin one.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Resolve the slot count from configuration (0 = auto-derive from cores).
pub fn derive_slots(configured: u32) -> usize {
    if configured > 0 {
        configured as usize
    } else if num_cpus::get() >= 4 {
        DEFAULT_MAX_CONCURRENT
    } else {
        1
    }
}

/// Gate limiting how many transcodes run at once.
#[derive(Clone)]
pub struct ConversionSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    running: Arc<AtomicUsize>,
}

/// Token held for the duration of one transcode; releasing it (by drop)
/// wakes the next waiter in FIFO order.
pub struct SlotToken {
    _permit: OwnedSemaphorePermit,
    running: Arc<AtomicUsize>,
}

impl Drop for SlotToken {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConversionSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Acquire a slot, waiting in FIFO order if all are taken.
    pub async fn acquire(&self) -> SlotToken {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore should not be closed");
        self.running.fetch_add(1, Ordering::SeqCst);
        SlotToken {
            _permit: permit,
            running: self.running.clone(),
        }
    }

    /// Try to acquire a slot without waiting.
    pub fn try_acquire(&self) -> Option<SlotToken> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        self.running.fetch_add(1, Ordering::SeqCst);
        Some(SlotToken {
            _permit: permit,
            running: self.running.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tokens currently held.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether an acquire would have to wait right now.
    pub fn is_saturated(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Occupancy string for queued-job messages, e.g. "2/2 running".
    pub fn occupancy(&self) -> String {
        format!("{}/{} running", self.running(), self.capacity)
    }
}
