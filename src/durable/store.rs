//! Durable Store Adapter Contract
//!
//! The cache engine consumes exactly one external capability: a durable,
//! asynchronous, string-keyed byte-store. Implementations own their
//! storage format; the engine hands them opaque blobs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{Error, Result};

/// Asynchronous byte-store collaborator
///
/// Every operation may fail transiently. The engine retries write failures
/// once (after freeing headroom) and degrades read failures to a miss.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, overwriting any previous blob
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove `key`, reporting whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove a batch of keys
    async fn remove_many(&self, keys: &[String]) -> Result<()>;

    /// Every key currently stored (the engine filters by its namespace)
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// In-memory durable store for tests and examples.
///
/// Backed by a `DashMap`, with injectable write/read failures so the
/// engine's retry and degradation paths can be exercised.
#[derive(Default)]
pub struct InMemoryDurableStore {
    blobs: DashMap<String, Bytes>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    /// Upcoming `set` calls that will fail transiently
    failing_sets: AtomicU64,
    /// Upcoming `get` calls that will fail transiently
    failing_gets: AtomicU64,
}

impl InMemoryDurableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` set calls fail
    pub fn fail_next_sets(&self, n: u64) {
        self.failing_sets.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` get calls fail
    pub fn fail_next_gets(&self, n: u64) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Overwrite a raw blob, bypassing failure injection (test corruption setup)
    pub fn put_raw(&self, key: &str, value: Bytes) {
        self.blobs.insert(key.to_string(), value);
    }

    /// Number of blobs currently stored
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Read operations served
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Write operations served
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Delete operations served
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    fn take_failure(counter: &AtomicU64) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        if Self::take_failure(&self.failing_gets) {
            return Err(Error::transient("get", "injected read failure"));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.blobs.get(key).map(|b| b.clone()))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        if Self::take_failure(&self.failing_sets) {
            return Err(Error::transient("set", "injected write failure"));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.blobs.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.blobs.remove(key).is_some())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.deletes.fetch_add(1, Ordering::Relaxed);
            self.blobs.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.blobs.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = InMemoryDurableStore::new();

        store.set("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));

        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_many_and_list() {
        let store = InMemoryDurableStore::new();
        for i in 0..4 {
            store
                .set(&format!("k{}", i), Bytes::from_static(b"v"))
                .await
                .unwrap();
        }

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3"]);

        store
            .remove_many(&["k0".to_string(), "k2".to_string()])
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection_is_transient() {
        let store = InMemoryDurableStore::new();
        store.fail_next_sets(2);

        let err = store.set("k", Bytes::new()).await.unwrap_err();
        assert_matches!(err, Error::TransientStorage { .. });
        assert_matches!(
            store.set("k", Bytes::new()).await,
            Err(Error::TransientStorage { .. })
        );

        // Third attempt succeeds
        store.set("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_op_counters() {
        let store = InMemoryDurableStore::new();
        store.set("k", Bytes::new()).await.unwrap();
        store.get("k").await.unwrap();
        store.get("missing").await.unwrap();
        store.remove("k").await.unwrap();

        assert_eq!(store.writes(), 1);
        assert_eq!(store.reads(), 2);
        assert_eq!(store.deletes(), 1);
    }
}
