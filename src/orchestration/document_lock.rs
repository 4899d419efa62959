//! # Per-document Locks
//!
//! Serializes operations on one `document_id` so two racing callers never load
//! the same snapshot and advance it independently. Documents never contend
//! with each other; entries are dropped once no caller holds or awaits them.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Registry of async mutexes keyed by document identifier
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<LockMap>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`
    pub async fn acquire(&self, document_id: &str) -> DocumentLockGuard {
        let mutex = self
            .locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        DocumentLockGuard {
            document_id: document_id.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Whether anyone currently holds or awaits the lock for `document_id`
    pub fn is_tracked(&self, document_id: &str) -> bool {
        self.locks.contains_key(document_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one document; released on drop
#[derive(Debug)]
pub struct DocumentLockGuard {
    document_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl DocumentLockGuard {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl Drop for DocumentLockGuard {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the map and waiters
        self.guard.take();
        self.locks
            .remove_if(&self.document_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
