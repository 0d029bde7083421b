use super::registry::JobRegistry;
use crate::sdk::{EventListener, SdkEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// The single listener the service registers on the connection; forwards
/// each event to the jobs registered at the moment it arrives.
pub struct EventFanout {
    registry: Arc<JobRegistry>,
    dispatched: AtomicU64,
}

impl EventFanout {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl EventListener for EventFanout {
    fn on_event(&self, event: SdkEvent) {
        let count = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("Connection event #{}: {:?}", count, event);
        self.registry.broadcast(&event);
    }
}
