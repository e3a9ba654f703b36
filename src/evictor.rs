//! Eviction Engine
//!
//! Enforces the durable tier's byte budget. Two passes: a cheap expiry
//! purge first, then oldest-`created_at`-first eviction down to 80% of
//! the budget. Insertion-order eviction is deliberate here - recomputing
//! true LRU order across the durable set is expensive, and the hot set is
//! already served by the memory tier's strict LRU.
//!
//! The memory tier's own cardinality budget is enforced inside
//! [`crate::memory::MemoryTier::insert`].

use chrono::Utc;
use tracing::{debug, info};

use crate::cache::CacheInner;
use crate::codec::Codec;
use crate::config::EVICTION_TARGET_RATIO;
use crate::error::{Error, Result};

impl<C: Codec> CacheInner<C> {
    /// Purge every expired entry from both tiers. Returns how many
    /// durable entries were reclaimed.
    pub(crate) async fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_except(None).await
    }

    /// Expiry purge that leaves `protect` untouched. The write path runs
    /// this mid-overwrite: removing the old record for the key being
    /// written would make the overwrite's own old-size subtraction count
    /// the same bytes twice.
    async fn purge_expired_except(&self, protect: Option<&str>) -> Result<usize> {
        let entries = self.durable.scan().await?;
        let now = Utc::now();

        let expired: Vec<(String, u64)> = entries
            .iter()
            .filter(|e| e.is_expired_at(now) && Some(e.key.as_str()) != protect)
            .map(|e| (e.key.clone(), e.size_bytes))
            .collect();
        let keys: Vec<String> = expired.iter().map(|(k, _)| k.clone()).collect();
        let freed: u64 = expired.iter().map(|(_, s)| s).sum();

        self.durable.drop_many(&keys).await?;

        let mut st = self.state.lock();
        for key in &keys {
            st.memory.remove(key);
        }
        // Memory-resident entries can outlive their durable record (e.g.
        // the record was dropped by another path); expire those too.
        let orphaned: Vec<String> = st
            .memory
            .entries()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.key.clone())
            .collect();
        for key in &orphaned {
            st.memory.remove(key);
        }
        st.total_durable_bytes = st.total_durable_bytes.saturating_sub(freed);
        drop(st);

        if !keys.is_empty() {
            debug!(purged = keys.len(), freed, "expiry purge");
        }
        Ok(keys.len())
    }

    /// Make room for `incoming` bytes. `protect` is the key being
    /// written, when called from the write path: its old record must not
    /// be reclaimed here, since the overwrite accounts for it separately.
    ///
    /// No-op while `total + incoming` fits the budget. Once over, runs
    /// the expiry purge, then evicts oldest-first until
    /// `total + incoming <= budget * 0.8` - the 20% headroom keeps the
    /// next small write from re-triggering eviction. Fails with
    /// `CapacityExhausted` if even a full pass cannot fit the write, in
    /// which case no entry the pass did not already reclaim is touched.
    pub(crate) async fn enforce_budget(&self, incoming: u64, protect: Option<&str>) -> Result<()> {
        let budget = self.config.max_durable_bytes;

        if self.state.lock().total_durable_bytes + incoming <= budget {
            return Ok(());
        }

        self.purge_expired_except(protect).await?;
        if self.state.lock().total_durable_bytes + incoming <= budget {
            return Ok(());
        }

        let target = (budget as f64 * EVICTION_TARGET_RATIO) as u64;
        let mut entries = self.durable.scan().await?;
        entries.sort_by_key(|e| e.created_at);

        let (victims, victim_bytes) = {
            let st = self.state.lock();
            let mut projected = st.total_durable_bytes;
            let mut victims = Vec::new();
            let mut victim_bytes = 0u64;
            for entry in &entries {
                if projected + incoming <= target {
                    break;
                }
                if Some(entry.key.as_str()) == protect {
                    continue;
                }
                projected = projected.saturating_sub(entry.size_bytes);
                victim_bytes += entry.size_bytes;
                victims.push(entry.key.clone());
            }
            (victims, victim_bytes)
        };

        self.evict_keys(&victims, victim_bytes).await?;

        let total = self.state.lock().total_durable_bytes;
        if total + incoming > budget {
            return Err(Error::CapacityExhausted {
                needed: incoming,
                budget,
            });
        }
        Ok(())
    }

    /// Aggressive pass for the write-retry path: purge expired entries,
    /// then evict oldest-first until at least `bytes` have been freed or
    /// the durable tier is empty. `protect` is the key being written; its
    /// previous record must survive in case the retry also fails. Returns
    /// the bytes actually freed.
    pub(crate) async fn evict_at_least(&self, bytes: u64, protect: &str) -> Result<u64> {
        let before = self.state.lock().total_durable_bytes;
        self.purge_expired_except(Some(protect)).await?;

        let freed_by_purge = before.saturating_sub(self.state.lock().total_durable_bytes);
        if freed_by_purge >= bytes {
            return Ok(freed_by_purge);
        }

        let mut entries = self.durable.scan().await?;
        entries.sort_by_key(|e| e.created_at);

        let mut victims = Vec::new();
        let mut victim_bytes = 0u64;
        for entry in &entries {
            if freed_by_purge + victim_bytes >= bytes {
                break;
            }
            if entry.key == protect {
                continue;
            }
            victim_bytes += entry.size_bytes;
            victims.push(entry.key.clone());
        }

        self.evict_keys(&victims, victim_bytes).await?;
        Ok(freed_by_purge + victim_bytes)
    }

    /// Drop a victim set from the durable tier, then from the memory tier
    /// and the tally.
    async fn evict_keys(&self, victims: &[String], victim_bytes: u64) -> Result<()> {
        if victims.is_empty() {
            return Ok(());
        }

        self.durable.drop_many(victims).await?;

        let mut st = self.state.lock();
        for key in victims {
            st.memory.remove(key);
        }
        st.total_durable_bytes = st.total_durable_bytes.saturating_sub(victim_bytes);
        drop(st);

        info!(evicted = victims.len(), freed = victim_bytes, "size-based eviction");
        Ok(())
    }
}
