//! Tracks the abort handles of every live session task, so the supervisor
//! can close every engine-side socket on shutdown without waiting on them.

use std::sync::Mutex;

use tokio::task::AbortHandle;

#[derive(Default)]
pub struct SessionTracker {
    handles: Mutex<Vec<AbortHandle>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly spawned session's abort handle, opportunistically
    /// dropping handles for sessions that have already finished.
    pub fn track(&self, handle: AbortHandle) {
        let mut handles = self.handles.lock().expect("session tracker mutex poisoned");
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Aborts every still-live session task. Aborting drops the task's
    /// future, which drops its owned sockets -- the splice loops on the
    /// other end observe this as EOF/error and terminate.
    pub fn abort_all(&self) {
        let handles = self.handles.lock().expect("session tracker mutex poisoned");
        for handle in handles.iter() {
            handle.abort();
        }
    }
}
