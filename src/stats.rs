//! Cache Statistics
//!
//! Read-only aggregation over a full durable scan plus the memory index.
//! This is a diagnostic path: O(n) is allowed here and nowhere on the
//! get/set path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::entry::CacheEntry;

/// How many keys the access leaderboard reports
pub const TOP_ACCESSED_LIMIT: usize = 10;

/// A key and its access count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAccess {
    pub key: String,
    pub access_count: u64,
}

/// Snapshot of cache usage
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Entries in the durable tier
    pub durable_items: usize,
    /// Entries resident in the memory tier
    pub memory_items: usize,
    /// Bytes occupied in the durable tier
    pub total_bytes: u64,
    /// Configured durable byte budget
    pub max_bytes: u64,
    /// total_bytes / max_bytes
    pub usage_ratio: f64,
    /// Creation time of the oldest durable entry
    pub oldest_created_at: Option<DateTime<Utc>>,
    /// Creation time of the newest durable entry
    pub newest_created_at: Option<DateTime<Utc>>,
    /// Durable entries stored compressed
    pub compressed_entries: usize,
    /// Mean stored entry size
    pub average_entry_bytes: u64,
    /// Most-read keys, descending by access count
    pub top_accessed: Vec<KeyAccess>,
    /// Process-lifetime read hits
    pub hits: u64,
    /// Process-lifetime read misses
    pub misses: u64,
}

/// Fold a durable scan and the live memory-tier access counts into a
/// stats snapshot. Memory-tier counts win for hot keys, since reads are
/// not written back to the durable record.
pub(crate) fn aggregate(
    durable_entries: &[CacheEntry],
    memory_counts: &HashMap<String, u64>,
    memory_items: usize,
    total_bytes: u64,
    max_bytes: u64,
    hits: u64,
    misses: u64,
) -> CacheStats {
    let durable_items = durable_entries.len();
    let stored_bytes: u64 = durable_entries.iter().map(|e| e.size_bytes).sum();
    let compressed_entries = durable_entries.iter().filter(|e| e.is_compressed).count();

    let mut leaderboard: Vec<KeyAccess> = durable_entries
        .iter()
        .map(|e| {
            let memory_count = memory_counts.get(&e.key).copied().unwrap_or(0);
            KeyAccess {
                key: e.key.clone(),
                access_count: e.access_count.max(memory_count),
            }
        })
        .collect();
    leaderboard.sort_by(|a, b| b.access_count.cmp(&a.access_count).then(a.key.cmp(&b.key)));
    leaderboard.truncate(TOP_ACCESSED_LIMIT);

    CacheStats {
        durable_items,
        memory_items,
        total_bytes,
        max_bytes,
        usage_ratio: if max_bytes == 0 {
            0.0
        } else {
            total_bytes as f64 / max_bytes as f64
        },
        oldest_created_at: durable_entries.iter().map(|e| e.created_at).min(),
        newest_created_at: durable_entries.iter().map(|e| e.created_at).max(),
        compressed_entries,
        average_entry_bytes: if durable_items == 0 {
            0
        } else {
            stored_bytes / durable_items as u64
        },
        top_accessed: leaderboard,
        hits,
        misses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str, size: usize, accesses: u64, compressed: bool) -> CacheEntry {
        let mut e = CacheEntry::new(key, vec![0u8; size], compressed, Duration::from_secs(60));
        e.access_count = accesses;
        e
    }

    #[test]
    fn test_aggregate_empty() {
        let stats = aggregate(&[], &HashMap::new(), 0, 0, 1000, 0, 0);
        assert_eq!(stats.durable_items, 0);
        assert_eq!(stats.average_entry_bytes, 0);
        assert_eq!(stats.usage_ratio, 0.0);
        assert!(stats.oldest_created_at.is_none());
        assert!(stats.top_accessed.is_empty());
    }

    #[test]
    fn test_aggregate_basics() {
        let entries = vec![
            entry("a", 100, 5, true),
            entry("b", 300, 1, false),
        ];
        let stats = aggregate(&entries, &HashMap::new(), 1, 400, 1000, 7, 3);

        assert_eq!(stats.durable_items, 2);
        assert_eq!(stats.memory_items, 1);
        assert_eq!(stats.total_bytes, 400);
        assert!((stats.usage_ratio - 0.4).abs() < 1e-9);
        assert_eq!(stats.compressed_entries, 1);
        assert_eq!(stats.average_entry_bytes, 200);
        assert_eq!(stats.hits, 7);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.oldest_created_at, Some(entries[0].created_at));
    }

    #[test]
    fn test_memory_counts_take_precedence() {
        let entries = vec![entry("hot", 10, 2, false), entry("cold", 10, 4, false)];
        let mut counts = HashMap::new();
        counts.insert("hot".to_string(), 9);

        let stats = aggregate(&entries, &counts, 1, 20, 100, 0, 0);
        assert_eq!(stats.top_accessed[0].key, "hot");
        assert_eq!(stats.top_accessed[0].access_count, 9);
        assert_eq!(stats.top_accessed[1].access_count, 4);
    }

    #[test]
    fn test_leaderboard_truncates() {
        let entries: Vec<_> = (0..25)
            .map(|i| entry(&format!("k{:02}", i), 1, i as u64, false))
            .collect();
        let stats = aggregate(&entries, &HashMap::new(), 0, 25, 100, 0, 0);

        assert_eq!(stats.top_accessed.len(), TOP_ACCESSED_LIMIT);
        assert_eq!(stats.top_accessed[0].access_count, 24);
    }
}
