//! Auth-state subscriber registry
//!
//! Observers of authenticated/unauthenticated transitions. Registration order
//! is notification order; ids come from a monotonic counter so two
//! registrations of the same callback never alias each other.
//!
//! Notification itself happens in the session, outside its state lock, over a
//! `snapshot()` of the list — a callback registered while a notification is
//! being delivered is not invoked for that transition, and unsubscribing
//! mid-notification cannot disturb iteration.

use std::sync::Arc;

/// Callback invoked with the current authenticated boolean.
pub type AuthCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: AuthCallback,
}

/// Ordered set of auth-state subscribers.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: u64,
    entries: Vec<Subscriber>,
}

impl SubscriberRegistry {
    /// Register a callback; returns its id for later removal.
    pub fn add(&mut self, callback: AuthCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Subscriber { id, callback });
        id
    }

    /// Remove the registration with the given id. Returns whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        self.entries.len() != before
    }

    /// Clone out the callbacks in registration order for fan-out outside the
    /// lock.
    pub fn snapshot(&self) -> Vec<AuthCallback> {
        self.entries.iter().map(|s| s.callback.clone()).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(log: &Arc<Mutex<Vec<(u64, bool)>>>, tag: u64) -> AuthCallback {
        let log = log.clone();
        Arc::new(move |status| {
            log.lock().unwrap().push((tag, status));
        })
    }

    #[test]
    fn notification_order_is_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        registry.add(recording(&log, 1));
        registry.add(recording(&log, 2));
        registry.add(recording(&log, 3));

        for cb in registry.snapshot() {
            cb(true);
        }
        assert_eq!(*log.lock().unwrap(), vec![(1, true), (2, true), (3, true)]);
    }

    #[test]
    fn remove_targets_one_registration_by_id() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        // Register the same callback twice; ids keep them apart
        let cb = recording(&log, 7);
        let first = registry.add(cb.clone());
        let second = registry.add(cb);

        assert!(registry.remove(first));
        assert_eq!(registry.len(), 1);

        for cb in registry.snapshot() {
            cb(false);
        }
        assert_eq!(*log.lock().unwrap(), vec![(7, false)]);

        assert!(registry.remove(second));
        assert!(!registry.remove(second));
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriberRegistry::default();
        let keep = registry.add(recording(&log, 1));
        registry.add(recording(&log, 2));

        let snapshot = registry.snapshot();
        // Mutations after the snapshot do not affect the in-flight fan-out
        registry.remove(keep);
        registry.add(recording(&log, 3));

        for cb in snapshot {
            cb(true);
        }
        assert_eq!(*log.lock().unwrap(), vec![(1, true), (2, true)]);
    }
}
