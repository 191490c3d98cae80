//! Bounded record cache with first-in, first-out eviction.
//!
//! Reads don't refresh an entry's position, so this is not an LRU.

use std::collections::{HashMap, VecDeque};

use super::Document;

#[derive(Debug)]
pub(crate) struct RecordCache {
    capacity: usize,
    entries: HashMap<String, Document>,
    order: VecDeque<String>,
}

impl RecordCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<Document> {
        self.entries.get(key).cloned()
    }

    /// Inserts or replaces. Replacing keeps the original insertion slot.
    pub(crate) fn insert(&mut self, key: String, document: Document) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, document);
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, document);
    }

    pub(crate) fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|candidate| candidate != key);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(n: i64) -> Document {
        let mut document = Document::new();
        document.insert("n".to_string(), json!(n));
        document
    }

    #[test]
    fn evicts_oldest_inserted_first() {
        let mut cache = RecordCache::new(2);
        cache.insert("a".to_string(), doc(1));
        cache.insert("b".to_string(), doc(2));
        // reading "a" does not protect it
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), doc(3));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacing_does_not_grow() {
        let mut cache = RecordCache::new(2);
        cache.insert("a".to_string(), doc(1));
        cache.insert("a".to_string(), doc(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(doc(5)));
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut cache = RecordCache::new(2);
        cache.insert("a".to_string(), doc(1));
        cache.insert("b".to_string(), doc(2));
        cache.remove("a");
        cache.insert("c".to_string(), doc(3));
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
