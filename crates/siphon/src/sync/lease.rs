//! Per-source single-flight leases.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

/// Set of sources with a run in flight.
#[derive(Debug, Clone, Default)]
pub struct SourceLeases {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl SourceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lease for `source_id`, or `None` if it is already held.
    pub fn try_acquire(&self, source_id: Uuid) -> Option<SourceLease> {
        if self.lock().insert(source_id) {
            Some(SourceLease {
                leases: self.clone(),
                source_id,
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, source_id: Uuid) -> bool {
        self.lock().contains(&source_id)
    }
}

/// Held lease; released on drop, including on error and cancellation paths.
#[derive(Debug)]
pub struct SourceLease {
    leases: SourceLeases,
    source_id: Uuid,
}

impl SourceLease {
    pub fn source_id(&self) -> Uuid {
        self.source_id
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        self.leases.lock().remove(&self.source_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_is_exclusive_until_dropped() {
        let leases = SourceLeases::new();
        let id = Uuid::new_v4();

        let lease = leases.try_acquire(id).expect("first acquire");
        assert!(leases.is_held(id));
        assert!(leases.try_acquire(id).is_none());
        assert!(leases.try_acquire(Uuid::new_v4()).is_some());

        drop(lease);
        assert!(!leases.is_held(id));
        assert!(leases.try_acquire(id).is_some());
    }
}
