//! Bounded response cache for the cached-GET facade
//!
//! An explicit key→body store with FIFO eviction at a fixed capacity. It sits
//! strictly on top of the request facade and never shadows lifecycle logic:
//! the session clears it wholesale on sign-out, and callers bypass it with an
//! explicit refresh parameter.

use std::collections::{HashMap, VecDeque};

pub(crate) struct ResponseCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    /// Store a body, evicting the oldest entry once the capacity is reached.
    /// Re-inserting an existing key replaces the body without changing its
    /// eviction position.
    pub fn insert(&mut self, key: &str, body: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.to_string(), body).is_some() {
            return;
        }
        self.order.push_back(key.to_string());
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_replaces() {
        let mut cache = ResponseCache::new(4);
        assert_eq!(cache.get("/a"), None);

        cache.insert("/a", "one".into());
        assert_eq!(cache.get("/a").as_deref(), Some("one"));

        cache.insert("/a", "two".into());
        assert_eq!(cache.get("/a").as_deref(), Some("two"));
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut cache = ResponseCache::new(2);
        cache.insert("/a", "a".into());
        cache.insert("/b", "b".into());
        cache.insert("/c", "c".into());

        assert_eq!(cache.get("/a"), None);
        assert_eq!(cache.get("/b").as_deref(), Some("b"));
        assert_eq!(cache.get("/c").as_deref(), Some("c"));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = ResponseCache::new(0);
        cache.insert("/a", "a".into());
        assert_eq!(cache.get("/a"), None);
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache = ResponseCache::new(2);
        cache.insert("/a", "a".into());
        cache.clear();
        assert_eq!(cache.get("/a"), None);

        // Reusable after clear
        cache.insert("/b", "b".into());
        assert_eq!(cache.get("/b").as_deref(), Some("b"));
    }
}
