//! Cache Configuration
//!
//! Budgets, TTL defaults and tuning knobs for the tiered cache engine.
//! Every knob can come from an environment variable via
//! [`CacheConfig::from_env`], with sensible defaults.

use std::env;
use std::time::Duration;

/// Default durable tier byte budget (50 MiB)
pub const DEFAULT_MAX_DURABLE_BYTES: u64 = 50 * 1024 * 1024;

/// Default memory tier cardinality ceiling
pub const DEFAULT_MAX_MEMORY_ITEMS: usize = 100;

/// Minimum payload size considered for compression (10 KiB)
pub const DEFAULT_COMPRESSION_MIN_SIZE: usize = 10 * 1024;

/// Compressed form must be strictly below this fraction of the original
/// size to be kept (< 80%, i.e. at least 20% smaller)
pub const DEFAULT_COMPRESSION_MAX_RATIO: f64 = 0.80;

/// Fraction of the byte budget to evict down to once size-based eviction
/// triggers. The 20% headroom avoids re-triggering on the next small write.
pub const EVICTION_TARGET_RATIO: f64 = 0.80;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Key prefix applied before delegating to the durable store
    pub namespace: String,
    /// Byte budget for the durable tier
    pub max_durable_bytes: u64,
    /// Item-count budget for the memory tier
    pub max_memory_items: usize,
    /// TTL applied when the caller does not override it per call
    pub default_ttl: Duration,
    /// Payloads below this size are never compressed
    pub compression_min_size: usize,
    /// Keep compression only when compressed/original is strictly below this
    pub compression_max_ratio: f64,
    /// Interval between reclamation passes
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "tiercache".to_string(),
            max_durable_bytes: DEFAULT_MAX_DURABLE_BYTES,
            max_memory_items: DEFAULT_MAX_MEMORY_ITEMS,
            default_ttl: Duration::from_secs(60 * 60),
            compression_min_size: DEFAULT_COMPRESSION_MIN_SIZE,
            compression_max_ratio: DEFAULT_COMPRESSION_MAX_RATIO,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Configuration with a custom namespace, other fields defaulted
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// # Environment Variables
    /// - `TIERCACHE_NAMESPACE` - key prefix (default: `tiercache`)
    /// - `TIERCACHE_MAX_DURABLE_BYTES` - durable byte budget (default: 50 MiB)
    /// - `TIERCACHE_MAX_MEMORY_ITEMS` - memory item budget (default: 100)
    /// - `TIERCACHE_DEFAULT_TTL_SECS` - default entry TTL (default: 3600)
    /// - `TIERCACHE_SWEEP_INTERVAL_SECS` - reclamation interval (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("TIERCACHE_NAMESPACE").unwrap_or(defaults.namespace),
            max_durable_bytes: env::var("TIERCACHE_MAX_DURABLE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_durable_bytes),
            max_memory_items: env::var("TIERCACHE_MAX_MEMORY_ITEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_memory_items),
            default_ttl: env::var("TIERCACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
            sweep_interval: env::var("TIERCACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            compression_min_size: defaults.compression_min_size,
            compression_max_ratio: defaults.compression_max_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_durable_bytes, 50 * 1024 * 1024);
        assert_eq!(config.max_memory_items, 100);
        assert_eq!(config.compression_min_size, 10 * 1024);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_with_namespace() {
        let config = CacheConfig::with_namespace("sessions");
        assert_eq!(config.namespace, "sessions");
        assert_eq!(config.max_memory_items, 100);
    }

    #[test]
    fn test_config_from_env_overrides() {
        env::set_var("TIERCACHE_NAMESPACE", "env_ns");
        env::set_var("TIERCACHE_MAX_MEMORY_ITEMS", "7");
        env::set_var("TIERCACHE_DEFAULT_TTL_SECS", "not a number");

        let config = CacheConfig::from_env();
        assert_eq!(config.namespace, "env_ns");
        assert_eq!(config.max_memory_items, 7);
        // Unparseable values fall back to the default
        assert_eq!(config.default_ttl, Duration::from_secs(3600));

        env::remove_var("TIERCACHE_NAMESPACE");
        env::remove_var("TIERCACHE_MAX_MEMORY_ITEMS");
        env::remove_var("TIERCACHE_DEFAULT_TTL_SECS");
    }
}
