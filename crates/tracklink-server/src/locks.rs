//! Per-user mutual exclusion.
//!
//! Every change to a user's projects or subscriptions is a read-check-write
//! sequence that may wait on the remote service in the middle. Holding the
//! user's lock for the whole sequence keeps two requests from both passing
//! the duplicate check. Users never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s records.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits for. Returns how many were dropped.
    pub async fn purge_idle(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        // The map's own handle is the only one left on an idle lock.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before - locks.len();
        if removed > 0 {
            debug!(removed, "Purged idle user locks");
        }
        removed
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
