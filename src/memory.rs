//! Memory Tier - Strict LRU
//!
//! Bounded, in-process hot set. A `HashMap` index points into a slab of
//! nodes threaded onto an intrusive doubly-linked recency list, so lookup,
//! promotion, insertion and eviction are all O(1).
//!
//! Eviction here is purely a hot-set demotion: the durable copy of an
//! evicted key is never touched.

use std::collections::HashMap;

use crate::entry::CacheEntry;

struct Node {
    entry: CacheEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded strict-LRU map of hot entries
pub struct MemoryTier {
    capacity: usize,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
}

impl MemoryTier {
    /// Create a tier holding at most `capacity` entries. A zero capacity
    /// (e.g. from a misconfigured environment variable) is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the tier is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` is resident
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Look up without touching recency order
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        let idx = *self.index.get(key)?;
        self.nodes[idx].as_ref().map(|n| &n.entry)
    }

    /// Mutable lookup without touching recency order
    pub fn peek_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        let idx = *self.index.get(key)?;
        self.nodes[idx].as_mut().map(|n| &mut n.entry)
    }

    /// Move `key` to the most-recently-used position
    pub fn promote(&mut self, key: &str) {
        if let Some(&idx) = self.index.get(key) {
            self.detach(idx);
            self.push_front(idx);
        }
    }

    /// Insert or overwrite an entry.
    ///
    /// At capacity, the least-recently-used entry is evicted *before* the
    /// insert so cardinality never exceeds the ceiling, even transiently.
    /// Returns the demoted entry, if any.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        if let Some(&idx) = self.index.get(&entry.key) {
            // Overwrite in place and promote
            if let Some(node) = self.nodes[idx].as_mut() {
                node.entry = entry;
            }
            self.detach(idx);
            self.push_front(idx);
            return None;
        }

        let demoted = if self.index.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };

        let key = entry.key.clone();
        let idx = self.alloc(Node {
            entry,
            prev: None,
            next: None,
        });
        self.index.insert(key, idx);
        self.push_front(idx);
        demoted
    }

    /// Remove an entry by key
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let idx = self.index.remove(key)?;
        self.detach(idx);
        let node = self.nodes[idx].take()?;
        self.free.push(idx);
        Some(node.entry)
    }

    /// Evict and return the least-recently-used entry
    pub fn evict_one(&mut self) -> Option<CacheEntry> {
        let idx = self.tail?;
        let key = self.nodes[idx].as_ref()?.entry.key.clone();
        self.remove(&key)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterate over resident entries (arbitrary order)
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.index
            .values()
            .filter_map(|&idx| self.nodes[idx].as_ref().map(|n| &n.entry))
    }

    /// Keys of resident entries (arbitrary order)
    pub fn keys(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    /// Key currently at the least-recently-used position
    #[cfg(test)]
    fn lru_key(&self) -> Option<&str> {
        let idx = self.tail?;
        self.nodes[idx].as_ref().map(|n| n.entry.key.as_str())
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Unlink a node from the recency list
    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    /// Link a detached node at the most-recently-used end
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, key.as_bytes().to_vec(), false, Duration::from_secs(60))
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let mut tier = MemoryTier::new(0);
        tier.insert(entry("a"));
        assert_eq!(tier.len(), 1);

        let demoted = tier.insert(entry("b"));
        assert_eq!(demoted.unwrap().key, "a");
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_insert_and_peek() {
        let mut tier = MemoryTier::new(4);
        tier.insert(entry("a"));

        assert_eq!(tier.len(), 1);
        assert!(tier.contains("a"));
        assert_eq!(tier.peek("a").unwrap().payload, b"a");
        assert!(tier.peek("b").is_none());
    }

    #[test]
    fn test_insert_evicts_lru_before_exceeding_capacity() {
        let mut tier = MemoryTier::new(3);
        tier.insert(entry("a"));
        tier.insert(entry("b"));
        tier.insert(entry("c"));

        let demoted = tier.insert(entry("d"));
        assert_eq!(demoted.unwrap().key, "a");
        assert_eq!(tier.len(), 3);
        assert!(!tier.contains("a"));
        assert!(tier.contains("d"));
    }

    #[test]
    fn test_promote_changes_eviction_victim() {
        // A, B, C inserted; promoting A means B is the LRU victim.
        let mut tier = MemoryTier::new(3);
        tier.insert(entry("a"));
        tier.insert(entry("b"));
        tier.insert(entry("c"));

        tier.promote("a");
        let demoted = tier.insert(entry("d"));

        assert_eq!(demoted.unwrap().key, "b");
        assert!(tier.contains("a"));
        assert!(tier.contains("c"));
        assert!(tier.contains("d"));
    }

    #[test]
    fn test_overwrite_promotes_and_keeps_cardinality() {
        let mut tier = MemoryTier::new(2);
        tier.insert(entry("a"));
        tier.insert(entry("b"));

        let mut replacement = entry("a");
        replacement.payload = b"new".to_vec();
        let demoted = tier.insert(replacement);

        assert!(demoted.is_none());
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.peek("a").unwrap().payload, b"new");
        // "a" was just touched, so "b" is the LRU
        assert_eq!(tier.lru_key(), Some("b"));
    }

    #[test]
    fn test_remove_relinks_list() {
        let mut tier = MemoryTier::new(3);
        tier.insert(entry("a"));
        tier.insert(entry("b"));
        tier.insert(entry("c"));

        let removed = tier.remove("b");
        assert_eq!(removed.unwrap().key, "b");
        assert_eq!(tier.len(), 2);

        // Eviction order must survive the middle removal
        assert_eq!(tier.evict_one().unwrap().key, "a");
        assert_eq!(tier.evict_one().unwrap().key, "c");
        assert!(tier.is_empty());
    }

    #[test]
    fn test_slab_slot_reuse() {
        let mut tier = MemoryTier::new(2);
        for round in 0..10 {
            let key = format!("k{}", round);
            tier.insert(entry(&key));
        }
        // Only capacity slots plus the free list should ever exist
        assert!(tier.nodes.len() <= 3);
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut tier = MemoryTier::new(4);
        tier.insert(entry("a"));
        tier.insert(entry("b"));

        tier.clear();
        assert!(tier.is_empty());
        assert!(tier.evict_one().is_none());
    }

    #[test]
    fn test_entries_iteration() {
        let mut tier = MemoryTier::new(4);
        tier.insert(entry("a"));
        tier.insert(entry("b"));

        let mut keys: Vec<_> = tier.entries().map(|e| e.key.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
