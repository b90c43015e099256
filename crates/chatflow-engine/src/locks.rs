//! Per-user turn serialization.
//!
//! The engine guarantees at most one turn in flight per user identifier:
//! concurrent turns for the same user are serialized, turns for different
//! users proceed fully in parallel. Each user id maps to a lightweight
//! exclusive-access scope, created lazily on the first turn and retained
//! for the user id's lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Map from user id to that user's turn lock.
///
/// `tokio::sync::Mutex` queues waiters fairly (FIFO), so for a single user
/// turn N's save completes before turn N+1 begins loading, and the turn log
/// reflects arrival order.
#[derive(Default)]
pub struct UserLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Creates an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a user, creating it on first use.
    ///
    /// The returned handle is cloned out of the map so the map's own lock
    /// is released before the caller awaits the user lock.
    pub async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(user_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of user ids seen so far.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    /// Whether no user has taken a turn yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_user_gets_same_lock() {
        let locks = UserLocks::new();
        let a = locks.lock_for("u1").await;
        let b = locks.lock_for("u1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len().await, 1);
    }

    #[tokio::test]
    async fn test_different_users_get_different_locks() {
        let locks = UserLocks::new();
        let a = locks.lock_for("u1").await;
        let b = locks.lock_for("u2").await;
        assert!(!Arc::ptr_eq(&a, &b));

        // Holding one user's lock does not block another user's.
        let _guard_a = a.lock().await;
        let _guard_b = b.lock().await;
    }
}
