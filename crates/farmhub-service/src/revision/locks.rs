//! Per-revision mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use farmhub_core::types::RevisionId;

/// One async mutex per revision id, created on first use.
///
/// Mutating operations hold the guard for their whole duration, so two
/// operations on the same revision never interleave while different
/// revisions proceed independently. The registry is process-local.
#[derive(Debug, Default)]
pub struct RevisionLocks {
    locks: DashMap<RevisionId, Arc<Mutex<()>>>,
}

impl RevisionLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a revision.
    pub async fn acquire(&self, id: RevisionId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        lock.lock_owned().await
    }

    /// Drop the entry for a revision nobody is holding or waiting on.
    pub fn forget(&self, id: RevisionId) {
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of revisions with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock is registered.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
