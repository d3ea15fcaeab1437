//! Per-session run lock: at most one active run per session.
//!
//! Unlike a queueing lock, a second turn arriving mid-run is rejected
//! outright — the transport cannot hold a second streaming response
//! open while waiting, and the client should see the busy state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Manages per-session run locks (each a `Semaphore(1)`).
#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the run lock for a session.
    ///
    /// `Ok(permit)` grants exclusive access for one run — hold it for
    /// the run's duration; it auto-releases on drop. `Err(SessionBusy)`
    /// means a run is already in progress.
    pub fn try_acquire(&self, session_id: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        sem.try_acquire_owned().map_err(|_| SessionBusy)
    }

    /// Number of tracked sessions (for monitoring).
    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop lock entries for sessions with no active run.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

/// Error returned when a session already has a run in progress.
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy — a run is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_acquire_release() {
        let map = SessionLockMap::new();
        let permit = map.try_acquire("s1").unwrap();
        drop(permit);
        let permit = map.try_acquire("s1").unwrap();
        drop(permit);
    }

    #[test]
    fn second_acquire_is_rejected_while_held() {
        let map = SessionLockMap::new();
        let _held = map.try_acquire("s1").unwrap();
        assert!(map.try_acquire("s1").is_err());
    }

    #[test]
    fn different_sessions_are_independent() {
        let map = SessionLockMap::new();
        let _p1 = map.try_acquire("s1").unwrap();
        let _p2 = map.try_acquire("s2").unwrap();
        assert_eq!(map.session_count(), 2);
    }

    #[test]
    fn prune_drops_idle_entries() {
        let map = SessionLockMap::new();
        {
            let _p = map.try_acquire("s1").unwrap();
            let _q = map.try_acquire("s2").unwrap();
            drop(_q);
            map.prune_idle();
            // s1 is held, s2 is idle.
            assert_eq!(map.session_count(), 1);
        }
    }
}
