//! Cache Entry
//!
//! The unit of storage shared by both tiers. The payload is always the
//! stored representation (encoded, possibly compressed); the memory tier
//! decodes on read so `size_bytes` has a single meaning everywhere.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single cached entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Caller-supplied opaque identifier (unprefixed)
    pub key: String,
    /// Encoded, possibly compressed value bytes. Serialized as base64:
    /// a JSON byte array would inflate the durable record to several
    /// times the payload size and undo the compression gate's savings.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Absolute expiry (`created_at + ttl`)
    pub expires_at: DateTime<Utc>,
    /// Size of the stored payload - the budget accounting unit
    pub size_bytes: u64,
    /// Incremented on every successful read
    pub access_count: u64,
    /// Timestamp of the most recent read
    pub last_accessed_at: DateTime<Utc>,
    /// Whether `payload` is LZ4-compressed
    pub is_compressed: bool,
}

impl CacheEntry {
    /// Build a new entry expiring `ttl` from now.
    ///
    /// A zero TTL is bumped to one millisecond so `expires_at` is always
    /// strictly after `created_at`.
    pub fn new(key: impl Into<String>, payload: Vec<u8>, is_compressed: bool, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = ttl.max(Duration::from_millis(1));
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let size_bytes = payload.len() as u64;

        Self {
            key: key.into(),
            payload,
            created_at: now,
            expires_at: now + ttl,
            size_bytes,
            access_count: 0,
            last_accessed_at: now,
            is_compressed,
        }
    }

    /// Whether the entry has expired as of `now`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the entry has expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Record a successful read
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }
}

/// Base64 serde adapter for the payload field
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
