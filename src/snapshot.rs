//! Shared handle to the current corpus snapshot.
//!
//! Readers call [`SnapshotHandle::current`] and keep the returned `Arc` for
//! as long as they need a consistent view; a concurrent
//! [`swap`](SnapshotHandle::swap) replaces the published snapshot without
//! disturbing them. No reader ever observes a mix of two snapshots.

use std::sync::{Arc, RwLock};

use knowledge_harness_core::CorpusSnapshot;

#[derive(Debug)]
pub struct SnapshotHandle {
    current: RwLock<Arc<CorpusSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: CorpusSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The published snapshot.
    pub fn current(&self) -> Arc<CorpusSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish `snapshot`, returning the one it replaced.
    pub fn swap(&self, snapshot: CorpusSnapshot) -> Arc<CorpusSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
