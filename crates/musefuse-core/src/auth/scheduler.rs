use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct ArmedTimer {
    id: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// One-shot expiry timer. At most one timer is live; arming replaces it.
///
/// Timers run as Tokio tasks, so `arm` must be called from within a runtime.
pub struct ExpirationScheduler {
    slot: Arc<Mutex<Option<ArmedTimer>>>,
    next_id: AtomicU64,
}

impl Default for ExpirationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpirationScheduler {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Cancel any live timer and schedule `on_fire` after `duration`.
    ///
    /// A zero or negative duration fires on the next scheduling turn.
    pub fn arm<F>(&self, duration: chrono::Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = duration.to_std().unwrap_or(std::time::Duration::ZERO);
        let deadline = Instant::now() + delay;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
            debug!(timer = previous.id, "Replaced expiry timer");
        }

        let task_slot = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            // Only the timer still in the slot may fire; it disarms itself first.
            let current = {
                let mut slot = task_slot.lock();
                match slot.as_ref() {
                    Some(timer) if timer.id == id => {
                        slot.take();
                        true
                    }
                    _ => false,
                }
            };
            if current {
                debug!(timer = id, "Expiry timer fired");
                on_fire();
            }
        });

        debug!(timer = id, delay_ms = delay.as_millis() as u64, "Armed expiry timer");
        *slot = Some(ArmedTimer {
            id,
            deadline,
            handle,
        });
    }

    /// Disarm without firing. No-op when nothing is armed.
    pub fn cancel(&self) {
        if let Some(timer) = self.slot.lock().take() {
            timer.handle.abort();
            debug!(timer = timer.id, "Cancelled expiry timer");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.lock().as_ref().map(|timer| timer.deadline)
    }

    /// Time left before the live timer fires
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for ExpirationScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.slot.lock().take() {
            timer.handle.abort();
        }
    }
}
