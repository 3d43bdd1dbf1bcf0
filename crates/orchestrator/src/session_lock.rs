//! Per-session turn exclusivity: at most one active turn per session id
//! (`spec.md` §4.7).
//!
//! Adapted directly from the teacher's `SessionLockMap`
//! (`gateway::runtime::session_lock`): each session key maps to a
//! `Semaphore(1)`, and holding the permit for the duration of a turn
//! guarantees no second turn can run concurrently against the same
//! session's transcript.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self { locks: Mutex::new(HashMap::new()) }
    }

    /// Acquires the run lock for a session, waiting if another turn is
    /// already in flight. The returned permit releases the lock on drop.
    pub async fn acquire(&self, session_id: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks.entry(session_id.to_owned()).or_insert_with(|| Arc::new(Semaphore::new(1))).clone()
        };
        sem.acquire_owned().await.expect("session semaphore is never closed")
    }

    /// `true` if a turn is currently holding the lock for this session.
    pub fn is_busy(&self, session_id: &str) -> bool {
        let locks = self.locks.lock();
        locks.get(session_id).map(|sem| sem.available_permits() == 0).unwrap_or(false)
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drops tracking entries for sessions with no turn in flight.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access_on_same_session() {
        let map = SessionLockMap::new();
        let permit1 = map.acquire("s1").await;
        drop(permit1);
        let permit2 = map.acquire("s1").await;
        drop(permit2);
    }

    #[tokio::test]
    async fn different_sessions_run_concurrently() {
        let map = Arc::new(SessionLockMap::new());
        let p1 = map.acquire("s1").await;
        let p2 = map.acquire("s2").await;
        assert_eq!(map.session_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn second_turn_waits_for_first_to_release() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();

        let p1 = map.acquire("s1").await;
        assert!(map.is_busy("s1"));

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("s1").await;
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);

        assert_eq!(handle.await.unwrap(), 42);
    }
}
