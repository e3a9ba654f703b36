//! tiercache - Tiered Cache Engine
//!
//! A two-tier cache for client devices sitting between application logic
//! and a slow, flaky durable key-value store: a bounded strict-LRU memory
//! tier in front of a byte-budgeted durable tier, with transparent LZ4
//! compression, stale-data reads and a background reclamation loop.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        TieredCache                             │
//! ├────────────────────────────────────────────────────────────────┤
//! │  Memory Tier (hot)          │  Durable Tier (persistent)       │
//! │  ┌───────────────────────┐  │  ┌────────────────────────────┐  │
//! │  │ strict LRU            │  │  │ DurableStore adapter       │  │
//! │  │ item-count budget     │  │  │ byte budget + compression  │  │
//! │  └───────────────────────┘  │  └────────────────────────────┘  │
//! │              │              │               │                  │
//! │              └──────────────┴───────────────┘                  │
//! │                             │                                  │
//! │             Eviction Engine + Reclamation Loop                 │
//! │         (expiry purge, oldest-first to 80% of budget)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tiercache::{CacheConfig, InMemoryDurableStore, TieredCache};
//!
//! # async fn example() -> tiercache::Result<()> {
//! let store = Arc::new(InMemoryDurableStore::new());
//! let cache = TieredCache::new(store, CacheConfig::default());
//! cache.initialize().await?;
//!
//! cache.set("user_42_profile", &"arda").await?;
//! let profile: Option<String> = cache.get("user_42_profile").await;
//! assert_eq!(profile.as_deref(), Some("arda"));
//!
//! cache.destroy().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - the `TieredCache` facade and read/write state machine
//! - [`codec`] - caller-supplied serialization capability
//! - [`compression`] - gated LZ4 payload compression
//! - [`config`] - budgets and tuning knobs
//! - [`durable`] - durable store contract and accessor
//! - [`entry`] - the cache entry value object
//! - [`error`] - error types
//! - [`memory`] - strict-LRU memory tier
//! - [`stats`] - diagnostic usage snapshots

pub mod cache;
pub mod codec;
pub mod compression;
pub mod config;
pub mod durable;
pub mod entry;
pub mod error;
pub mod memory;
pub mod stats;

mod evictor;
mod sweeper;

// Re-export commonly used types
pub use cache::{GetOptions, SetOptions, StaleValue, TieredCache};
pub use codec::{Codec, JsonCodec};
pub use config::CacheConfig;
pub use durable::{DurableStore, InMemoryDurableStore};
pub use entry::CacheEntry;
pub use error::{Error, Result};
pub use stats::{CacheStats, KeyAccess};
