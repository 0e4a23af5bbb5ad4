//! Per-document mutual exclusion
//!
//! Enhancement, apply and rollback on one document all take the same lock,
//! so at most one of them is in flight per document.

use dashmap::DashMap;
use esp_document::DocumentRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while a document is being mutated
pub type DocumentGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: DashMap<DocumentRef, Arc<Mutex<()>>>,
}

impl DocumentLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for the lock on `document`
    ///
    /// Returns `None` when the wait times out.
    pub async fn acquire(&self, document: &DocumentRef, timeout: Duration) -> Option<DocumentGuard> {
        let lock = self
            .locks
            .entry(document.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        tokio::time::timeout(timeout, lock.lock_owned()).await.ok()
    }

    /// Drop lock entries nobody holds or waits on
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let locks = DocumentLocks::new();
        let doc = DocumentRef::from("a.md");
        let guard = locks.acquire(&doc, Duration::from_millis(50)).await;
        assert!(guard.is_some());
        assert!(locks.acquire(&doc, Duration::from_millis(20)).await.is_none());

        drop(guard);
        assert!(locks.acquire(&doc, Duration::from_millis(20)).await.is_some());
    }

    #[tokio::test]
    async fn distinct_documents_do_not_contend() {
        let locks = DocumentLocks::new();
        let _a = locks.acquire(&DocumentRef::from("a.md"), Duration::from_millis(20)).await.unwrap();
        assert!(locks
            .acquire(&DocumentRef::from("b.md"), Duration::from_millis(20))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = DocumentLocks::new();
        let held = locks.acquire(&DocumentRef::from("a.md"), Duration::from_millis(20)).await;
        drop(locks.acquire(&DocumentRef::from("b.md"), Duration::from_millis(20)).await);
        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);
        drop(held);
    }
}
