//! Shared handle to an entity store
//!
//! Every clone refers to the same store and the same sync-in-progress flag,
//! so at most one sync run can hold a store at a time no matter how many
//! engines are built over it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// Cloneable handle: the store behind an async mutex plus its sync flag
pub struct SharedStore<S> {
    store: Arc<Mutex<S>>,
    syncing: Arc<AtomicBool>,
}

impl<S> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            syncing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lock the store for one unit of work
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().await
    }

    /// Whether a sync run currently holds this store
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Claim the sync flag; returns false if another run holds it
    pub(crate) fn try_begin_sync(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_sync(&self) {
        self.syncing.store(false, Ordering::Release);
    }
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            syncing: Arc::clone(&self.syncing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_sync_flag() {
        let a = SharedStore::new(0u32);
        let b = a.clone();

        assert!(a.try_begin_sync());
        assert!(b.is_syncing());
        assert!(!b.try_begin_sync());

        a.end_sync();
        assert!(!b.is_syncing());
        assert!(b.try_begin_sync());
    }

    #[tokio::test]
    async fn test_clones_share_the_store() {
        let a = SharedStore::new(Vec::<u32>::new());
        let b = a.clone();
        a.lock().await.push(7);
        assert_eq!(*b.lock().await, vec![7]);
    }
}
