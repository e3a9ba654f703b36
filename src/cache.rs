//! Tiered Cache Facade
//!
//! Orchestrates the memory tier, the durable tier, compression and the
//! reclamation loop behind a typed get/set API.
//!
//! # Concurrency
//!
//! The memory tier and the durable byte tally form one shared mutable
//! region guarded by a single `parking_lot::Mutex`. The guard is never
//! held across an `.await`: every durable-store call happens with the
//! lock released, so a slow store cannot stall concurrent cache users.
//! Two concurrent `set` calls on the same key may interleave; last writer
//! wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::codec::{Codec, JsonCodec};
use crate::compression::Compression;
use crate::config::CacheConfig;
use crate::durable::{DurableStore, DurableTier, InMemoryDurableStore};
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::memory::MemoryTier;
use crate::stats::{self, CacheStats};
use crate::sweeper::{self, SweeperHandle};

/// Per-call overrides for `set`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// TTL for this entry; falls back to the configured default
    pub ttl: Option<Duration>,
}

/// Per-call overrides for `get`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Bypass the memory tier and reload from the durable tier
    pub force_refresh: bool,
}

/// Result of a stale-tolerant read: the value is returned even past its
/// expiry, together with an explicit staleness flag, to support
/// revalidate-while-serving-stale patterns.
#[derive(Debug)]
pub struct StaleValue<T> {
    pub value: Option<T>,
    pub is_stale: bool,
}

/// Shared mutable region - one lock, never held across I/O
pub(crate) struct CacheState {
    pub(crate) memory: MemoryTier,
    pub(crate) total_durable_bytes: u64,
    pub(crate) initialized: bool,
}

pub(crate) struct CacheInner<C: Codec> {
    pub(crate) config: CacheConfig,
    pub(crate) codec: C,
    pub(crate) compression: Compression,
    pub(crate) durable: DurableTier,
    pub(crate) state: Mutex<CacheState>,
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    sweeper: Mutex<Option<SweeperHandle>>,
}

/// Tiered cache engine
///
/// Explicitly constructed and injectable; independent instances share
/// nothing. Cloning is cheap and clones observe the same cache.
pub struct TieredCache<C: Codec = JsonCodec> {
    inner: Arc<CacheInner<C>>,
}

impl<C: Codec> Clone for TieredCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl TieredCache<JsonCodec> {
    /// Create a cache with the default JSON codec
    pub fn new(store: Arc<dyn DurableStore>, config: CacheConfig) -> Self {
        Self::with_codec(store, config, JsonCodec)
    }

    /// Create a cache over an in-memory store (tests and examples)
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(InMemoryDurableStore::new()), config)
    }
}

impl<C: Codec> TieredCache<C> {
    /// Create a cache with a caller-supplied serialization capability
    pub fn with_codec(store: Arc<dyn DurableStore>, config: CacheConfig, codec: C) -> Self {
        let durable = DurableTier::new(store, &config.namespace);
        let compression = Compression::new(config.compression_min_size, config.compression_max_ratio);
        let memory = MemoryTier::new(config.max_memory_items);

        Self {
            inner: Arc::new(CacheInner {
                config,
                codec,
                compression,
                durable,
                state: Mutex::new(CacheState {
                    memory,
                    total_durable_bytes: 0,
                    initialized: false,
                }),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Reconcile the durable byte tally with a full scan and start the
    /// reclamation loop. Idempotent: the scan runs exactly once per
    /// initialize/destroy cycle.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.state.lock().initialized {
            return Ok(());
        }

        let entries = self.inner.durable.scan().await?;
        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();

        {
            let mut st = self.inner.state.lock();
            if st.initialized {
                return Ok(());
            }
            st.total_durable_bytes = total;
            st.initialized = true;
        }

        let handle = sweeper::spawn(self.inner.clone(), self.inner.config.sweep_interval);
        *self.inner.sweeper.lock() = Some(handle);

        info!(
            entries = entries.len(),
            total_bytes = total,
            namespace = %self.inner.config.namespace,
            "cache initialized"
        );
        Ok(())
    }

    /// Stop the reclamation loop and reset in-process state. The durable
    /// tier is left intact; a later `initialize` reconciles against it.
    pub async fn destroy(&self) {
        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }

        let mut st = self.inner.state.lock();
        st.memory.clear();
        st.total_durable_bytes = 0;
        st.initialized = false;
    }

    /// Store a value under `key` with the default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_options(key, value, SetOptions::default()).await
    }

    /// Store a value, optionally overriding the TTL.
    ///
    /// Write-through: the value is durable before it becomes visible in
    /// the memory tier. A store failure is retried exactly once after an
    /// aggressive eviction pass; if the retry also fails the write is
    /// abandoned and the in-memory copy for the key is rolled back, so a
    /// value that is not durable is never served.
    pub async fn set_with_options<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let inner = &self.inner;
        let encoded = inner.codec.encode(value)?;
        let (stored, is_compressed) = inner.compression.maybe_compress(&encoded);
        let ttl = options.ttl.unwrap_or(inner.config.default_ttl);
        let entry = CacheEntry::new(key, stored, is_compressed, ttl);
        let size = entry.size_bytes;
        let budget = inner.config.max_durable_bytes;

        if size > budget {
            return Err(Error::CapacityExhausted {
                needed: size,
                budget,
            });
        }

        // Size of the record being replaced, so the tally stays exact on
        // overwrite. A failed read here overcounts, which only makes
        // eviction run earlier.
        let old_size = {
            let peeked = inner.state.lock().memory.peek(key).map(|e| e.size_bytes);
            match peeked {
                Some(s) => s,
                None => match inner.durable.load(key).await {
                    Ok(old) => old.map(|e| e.size_bytes).unwrap_or(0),
                    Err(e) => {
                        warn!(key, "could not size previous record: {}", e);
                        0
                    }
                },
            }
        };

        inner.enforce_budget(size.saturating_sub(old_size), Some(key)).await?;

        if let Err(first) = inner.durable.store(&entry).await {
            warn!(
                key,
                "durable store failed, freeing headroom and retrying once: {}", first
            );
            inner.evict_at_least(size.saturating_mul(2), key).await?;

            if let Err(second) = inner.durable.store(&entry).await {
                inner.state.lock().memory.remove(key);
                return Err(second);
            }
        }

        let mut st = inner.state.lock();
        st.total_durable_bytes = st.total_durable_bytes.saturating_sub(old_size) + size;
        st.memory.insert(entry);
        Ok(())
    }

    /// Fetch a value. Expired entries are treated as absent and purged
    /// from both tiers. Any failure along the way degrades to a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with_options(key, GetOptions::default()).await
    }

    /// Fetch a value with per-call options
    pub async fn get_with_options<T: DeserializeOwned>(
        &self,
        key: &str,
        options: GetOptions,
    ) -> Option<T> {
        match self.lookup(key, true, options.force_refresh).await {
            Some((bytes, _)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                self.decode(key, &bytes)
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Fetch a value without treating expiry as absence
    pub async fn get_with_stale<T: DeserializeOwned>(&self, key: &str) -> StaleValue<T> {
        match self.lookup(key, false, false).await {
            Some((bytes, is_stale)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                StaleValue {
                    value: self.decode(key, &bytes),
                    is_stale,
                }
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                StaleValue {
                    value: None,
                    is_stale: false,
                }
            }
        }
    }

    /// Whether a fresh value exists for `key` (eager-expiry semantics of `get`)
    pub async fn has(&self, key: &str) -> bool {
        match self.lookup(key, true, false).await {
            Some(_) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Remove `key` from both tiers
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.inner.state.lock().memory.remove(key);

        let size = match self.inner.durable.load(key).await {
            Ok(Some(entry)) => entry.size_bytes,
            Ok(None) => 0,
            Err(e) => {
                warn!(key, "could not size record before removal: {}", e);
                0
            }
        };
        self.inner.durable.drop_entry(key).await?;

        let mut st = self.inner.state.lock();
        st.total_durable_bytes = st.total_durable_bytes.saturating_sub(size);
        Ok(())
    }

    /// Purge every expired entry from both tiers, returning how many
    /// durable entries were reclaimed
    pub async fn clear_expired(&self) -> Result<usize> {
        self.inner.purge_expired().await
    }

    /// Remove every entry in this cache's namespace
    pub async fn clear_all(&self) -> Result<()> {
        let dropped = self.inner.durable.wipe().await?;

        let mut st = self.inner.state.lock();
        st.memory.clear();
        st.total_durable_bytes = 0;
        drop(st);

        info!(dropped, "cleared all entries");
        Ok(())
    }

    /// Remove every key containing `pattern` from both tiers
    pub async fn invalidate_matching(&self, pattern: &str) -> Result<usize> {
        let entries = self.inner.durable.scan().await?;
        let victims: Vec<&CacheEntry> = entries.iter().filter(|e| e.key.contains(pattern)).collect();
        let keys: Vec<String> = victims.iter().map(|e| e.key.clone()).collect();
        let freed: u64 = victims.iter().map(|e| e.size_bytes).sum();

        self.inner.durable.drop_many(&keys).await?;

        let mut st = self.inner.state.lock();
        for key in &keys {
            st.memory.remove(key);
        }
        // Memory copies whose durable record was already gone
        let orphans: Vec<String> = st
            .memory
            .keys()
            .into_iter()
            .filter(|k| k.contains(pattern))
            .collect();
        for key in &orphans {
            st.memory.remove(key);
        }
        st.total_durable_bytes = st.total_durable_bytes.saturating_sub(freed);
        Ok(keys.len())
    }

    /// Usage snapshot. O(n) over the durable tier - a diagnostic path,
    /// never called from `get`/`set`.
    pub async fn stats(&self) -> Result<CacheStats> {
        let entries = self.inner.durable.scan().await?;

        let (memory_counts, memory_items, total) = {
            let st = self.inner.state.lock();
            let counts: HashMap<String, u64> = st
                .memory
                .entries()
                .map(|e| (e.key.clone(), e.access_count))
                .collect();
            (counts, st.memory.len(), st.total_durable_bytes)
        };

        Ok(stats::aggregate(
            &entries,
            &memory_counts,
            memory_items,
            total,
            self.inner.config.max_durable_bytes,
            self.inner.hits.load(Ordering::Relaxed),
            self.inner.misses.load(Ordering::Relaxed),
        ))
    }

    /// Bytes currently billed against the durable budget
    pub fn total_durable_bytes(&self) -> u64 {
        self.inner.state.lock().total_durable_bytes
    }

    /// Entries resident in the memory tier
    pub fn memory_len(&self) -> usize {
        self.inner.state.lock().memory.len()
    }

    /// Whether `key` is resident in the memory tier (no promotion)
    pub fn is_hot(&self, key: &str) -> bool {
        self.inner.state.lock().memory.contains(key)
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Option<T> {
        match self.inner.codec.decode(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "cached value failed to decode: {}", e);
                None
            }
        }
    }

    /// The read state machine shared by `get`, `get_with_stale` and `has`.
    ///
    /// Returns the decompressed logical bytes and the staleness flag.
    /// `eager_expiry` makes an expired entry a miss and purges it from
    /// both tiers; `force_refresh` skips the memory tier entirely.
    async fn lookup(
        &self,
        key: &str,
        eager_expiry: bool,
        force_refresh: bool,
    ) -> Option<(Vec<u8>, bool)> {
        enum MemLookup {
            Hit {
                payload: Vec<u8>,
                compressed: bool,
                stale: bool,
                size: u64,
            },
            Expired(u64),
            Miss,
        }

        let inner = &self.inner;

        if !force_refresh {
            let outcome = {
                let mut st = inner.state.lock();
                match st.memory.peek_mut(key) {
                    Some(entry) => {
                        let stale = entry.is_expired();
                        if stale && eager_expiry {
                            let size = entry.size_bytes;
                            st.memory.remove(key);
                            MemLookup::Expired(size)
                        } else {
                            entry.record_access();
                            let payload = entry.payload.clone();
                            let compressed = entry.is_compressed;
                            let size = entry.size_bytes;
                            st.memory.promote(key);
                            MemLookup::Hit {
                                payload,
                                compressed,
                                stale,
                                size,
                            }
                        }
                    }
                    None => MemLookup::Miss,
                }
            };

            match outcome {
                MemLookup::Hit {
                    payload,
                    compressed,
                    stale,
                    size,
                } => return self.finish_read(key, payload, compressed, stale, size).await,
                MemLookup::Expired(size) => {
                    if let Err(e) = inner.durable.drop_entry(key).await {
                        warn!(key, "failed to drop expired durable record: {}", e);
                    }
                    let mut st = inner.state.lock();
                    st.total_durable_bytes = st.total_durable_bytes.saturating_sub(size);
                    return None;
                }
                MemLookup::Miss => {}
            }
        }

        let loaded = match inner.durable.load(key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(key, "durable read failed, treating as miss: {}", e);
                return None;
            }
        };

        let mut entry = match loaded {
            Some(entry) => entry,
            None => {
                if force_refresh {
                    // The memory tier must never be the sole source of truth
                    inner.state.lock().memory.remove(key);
                }
                return None;
            }
        };

        let stale = entry.is_expired();
        if stale && eager_expiry {
            let size = entry.size_bytes;
            if let Err(e) = inner.durable.drop_entry(key).await {
                warn!(key, "failed to drop expired durable record: {}", e);
            }
            let mut st = inner.state.lock();
            st.memory.remove(key);
            st.total_durable_bytes = st.total_durable_bytes.saturating_sub(size);
            return None;
        }

        entry.record_access();
        let payload = entry.payload.clone();
        let compressed = entry.is_compressed;
        let size = entry.size_bytes;
        inner.state.lock().memory.insert(entry);

        self.finish_read(key, payload, compressed, stale, size).await
    }

    /// Decompress if needed. A decompression failure is corruption: the
    /// entry is purged from both tiers so it is not retried indefinitely,
    /// and the read is a miss - corrupted bytes are never returned.
    async fn finish_read(
        &self,
        key: &str,
        payload: Vec<u8>,
        compressed: bool,
        stale: bool,
        size: u64,
    ) -> Option<(Vec<u8>, bool)> {
        if !compressed {
            return Some((payload, stale));
        }

        match self.inner.compression.decompress(&payload) {
            Ok(bytes) => Some((bytes, stale)),
            Err(e) => {
                warn!(key, "corrupted entry, purging from both tiers: {}", e);
                if let Err(e) = self.inner.durable.drop_entry(key).await {
                    warn!(key, "failed to drop corrupted durable record: {}", e);
                }
                let mut st = self.inner.state.lock();
                st.memory.remove(key);
                st.total_durable_bytes = st.total_durable_bytes.saturating_sub(size);
                None
            }
        }
    }
}
