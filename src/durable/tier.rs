//! Durable Tier Accessor
//!
//! Reads and writes [`CacheEntry`] records through the durable store
//! adapter. Every key is prefixed with the configured namespace before
//! delegation, and `list_keys()` results are filtered back through that
//! prefix, so the engine coexists with other users of the same store.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use super::store::DurableStore;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};

/// Namespaced accessor over the durable store
#[derive(Clone)]
pub struct DurableTier {
    store: Arc<dyn DurableStore>,
    prefix: String,
}

impl DurableTier {
    /// Wrap a store adapter under `namespace`
    pub fn new(store: Arc<dyn DurableStore>, namespace: &str) -> Self {
        Self {
            store,
            prefix: format!("{}:", namespace),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Load an entry. A record that fails to deserialize is corruption:
    /// it is removed so it is not retried indefinitely, and reported as
    /// absent.
    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let blob = match self.store.get(&self.prefixed(key)).await? {
            Some(blob) => blob,
            None => return Ok(None),
        };

        match serde_json::from_slice::<CacheEntry>(&blob) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key, "dropping undecodable durable record: {}", e);
                let _ = self.store.remove(&self.prefixed(key)).await;
                Ok(None)
            }
        }
    }

    /// Persist an entry. Failures propagate to the caller, never swallowed.
    pub async fn store(&self, entry: &CacheEntry) -> Result<()> {
        let blob = serde_json::to_vec(entry).map_err(|e| Error::Encode(e.to_string()))?;
        self.store
            .set(&self.prefixed(&entry.key), Bytes::from(blob))
            .await
    }

    /// Remove a single entry
    pub async fn drop_entry(&self, key: &str) -> Result<bool> {
        self.store.remove(&self.prefixed(key)).await
    }

    /// Remove a batch of entries
    pub async fn drop_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed(k)).collect();
        self.store.remove_many(&prefixed).await
    }

    /// Unprefixed keys of every entry in this namespace
    pub async fn list(&self) -> Result<Vec<String>> {
        let keys = self.store.list_keys().await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    /// Load every entry in this namespace. O(n) over the durable tier;
    /// used by startup reconciliation, eviction and stats, never by the
    /// hot read/write path.
    pub async fn scan(&self) -> Result<Vec<CacheEntry>> {
        let keys = self.list().await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.load(&key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Remove every entry in this namespace, returning how many keys were dropped
    pub async fn wipe(&self) -> Result<usize> {
        let keys = self.list().await?;
        self.drop_many(&keys).await?;
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::InMemoryDurableStore;
    use std::time::Duration;

    fn tier(store: &Arc<InMemoryDurableStore>) -> DurableTier {
        DurableTier::new(store.clone() as Arc<dyn DurableStore>, "test")
    }

    fn entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, key.as_bytes().to_vec(), false, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_store_load_roundtrip() {
        let store = Arc::new(InMemoryDurableStore::new());
        let tier = tier(&store);

        tier.store(&entry("a")).await.unwrap();
        let loaded = tier.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.key, "a");
        assert_eq!(loaded.payload, b"a");

        // Stored under the prefixed key
        assert!(store.get("test:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let store = Arc::new(InMemoryDurableStore::new());
        let tier = tier(&store);
        store.put_raw("other:a", Bytes::from_static(b"junk"));

        tier.store(&entry("a")).await.unwrap();
        tier.store(&entry("b")).await.unwrap();

        let mut keys = tier.list().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(tier.scan().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_dropped_and_absent() {
        let store = Arc::new(InMemoryDurableStore::new());
        let tier = tier(&store);
        store.put_raw("test:bad", Bytes::from_static(b"{not a record"));

        assert!(tier.load("bad").await.unwrap().is_none());
        assert!(store.get("test:bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wipe_clears_only_namespace() {
        let store = Arc::new(InMemoryDurableStore::new());
        let tier = tier(&store);
        store.put_raw("other:a", Bytes::from_static(b"junk"));

        tier.store(&entry("a")).await.unwrap();
        tier.store(&entry("b")).await.unwrap();

        let dropped = tier.wipe().await.unwrap();
        assert_eq!(dropped, 2);
        assert!(tier.list().await.unwrap().is_empty());
        assert!(store.get("other:a").await.unwrap().is_some());
    }
}
