//! Concurrent mapping from canonical test names to remote tracking ids.
//!
//! Entries are created when a test is registered with the tracking service,
//! either during discovery or as a fallback while its result is processed,
//! and live for the rest of the run. Discovery and result handlers may run on
//! different threads at the same time, so every operation takes the lock for
//! exactly one key access.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Remote identifier of a registered test result.
pub type TrackingId = i64;

/// Thread-safe table of registered tests.
///
/// # Example
///
/// ```
/// use testfarm_logger::tracker::ResultTracker;
///
/// let tracker = ResultTracker::new();
/// tracker.register("Ns.C.M", 42);
/// assert_eq!(tracker.lookup("Ns.C.M"), Some(42));
/// assert_eq!(tracker.lookup("Ns.C.Other"), None);
/// ```
#[derive(Debug, Default)]
pub struct ResultTracker {
    entries: RwLock<HashMap<String, TrackingId>>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the tracking id for `name`.
    ///
    /// Concurrent writers to the same key are serialized; the last one wins.
    pub fn register(&self, name: impl Into<String>, id: TrackingId) {
        let name = name.into();
        if let Some(previous) = self.write().insert(name.clone(), id)
            && previous != id
        {
            tracing::debug!("Tracking id for {} replaced: {} -> {}", name, previous, id);
        }
    }

    /// Returns the tracking id for `name`, if registered.
    pub fn lookup(&self, name: &str) -> Option<TrackingId> {
        self.read().get(name).copied()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Number of distinct registered names.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// All registered names, in no particular order.
    pub fn all_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    // A panic while holding the lock cannot leave a half-written entry behind,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TrackingId>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TrackingId>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
