//! Error types for the tiered cache engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache engine
///
/// All variants are handled locally within the engine on the common path:
/// read failures degrade to a miss, write failures surface as a typed
/// `Result` the caller may choose to ignore.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store read/write failure (may succeed on retry)
    #[error("transient storage failure during {operation}: {reason}")]
    TransientStorage { operation: String, reason: String },

    /// Compression failed (never fatal, caller falls back to uncompressed)
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// Decompression failed - data corruption or format mismatch.
    /// The corrupted entry must be purged, never returned as a value.
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Eviction could not free enough space for the incoming entry
    #[error("capacity exhausted: entry of {needed} bytes does not fit budget of {budget} bytes")]
    CapacityExhausted { needed: u64, budget: u64 },

    /// Value could not be encoded for storage
    #[error("encode error: {0}")]
    Encode(String),

    /// Stored record or value could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Shorthand for transient storage errors
    pub fn transient(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::TransientStorage {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}
