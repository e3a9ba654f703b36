//! Value Codec
//!
//! The engine never interprets the logical shape of cached values; callers
//! supply a serialization capability through the [`Codec`] trait and the
//! engine moves opaque byte blobs between tiers.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialization capability supplied by the caller
pub trait Codec: Send + Sync + 'static {
    /// Encode a value into the bytes that will be stored (pre-compression)
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from stored (post-decompression) bytes
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec - the default serialization capability
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}
