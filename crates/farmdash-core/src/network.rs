use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::sync::SyncQueue;

/// Connectivity as reported by the host platform.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
    fn pending_changes(&self) -> usize;
}

/// Online flag toggled by the host; the pending count comes from the
/// attached sync queue, if any.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    queue: Option<Arc<SyncQueue>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<SyncQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl NetworkStatus for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn pending_changes(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.len())
    }
}
