//! Transparent Payload Compression
//!
//! LZ4 compression with a cost/benefit gate: payloads below a size
//! threshold are never compressed, and a compressed form is kept only when
//! it is strictly smaller than 80% of the original. Compression failure
//! falls back to uncompressed storage; decompression failure is a
//! data-integrity error the read path must treat as a miss.

use crate::config::{DEFAULT_COMPRESSION_MAX_RATIO, DEFAULT_COMPRESSION_MIN_SIZE};
use crate::error::{Error, Result};

/// Gated LZ4 compressor
#[derive(Debug, Clone)]
pub struct Compression {
    /// Payloads below this size skip compression entirely
    min_size: usize,
    /// Compressed/original must be strictly below this ratio to be kept
    max_ratio: f64,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_COMPRESSION_MIN_SIZE,
            max_ratio: DEFAULT_COMPRESSION_MAX_RATIO,
        }
    }
}

impl Compression {
    /// Create a compressor with custom threshold and gate
    pub fn new(min_size: usize, max_ratio: f64) -> Self {
        Self {
            min_size,
            max_ratio,
        }
    }

    /// Compress when beneficial.
    ///
    /// Returns the bytes that should be stored and whether they are
    /// compressed. The gate discards compression that does not reduce the
    /// size below `max_ratio` of the original, so CPU and bookkeeping are
    /// not spent on data that barely benefits.
    pub fn maybe_compress(&self, data: &[u8]) -> (Vec<u8>, bool) {
        if data.len() < self.min_size {
            return (data.to_vec(), false);
        }

        match self.compress(data) {
            Ok(compressed) => {
                let gate = (data.len() as f64 * self.max_ratio) as usize;
                if compressed.len() < gate {
                    (compressed, true)
                } else {
                    (data.to_vec(), false)
                }
            }
            Err(e) => {
                tracing::warn!("compression failed, storing uncompressed: {}", e);
                (data.to_vec(), false)
            }
        }
    }

    /// Compress unconditionally
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(data, None, true)
            .map_err(|e| Error::CompressionFailed(e.to_string()))
    }

    /// Exact inverse of a kept compression.
    ///
    /// Failure means corruption or a format mismatch; the caller removes
    /// the entry from both tiers rather than propagating corrupted bytes.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None)
            .map_err(|e| Error::DecompressionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn compressible_payload(len: usize) -> Vec<u8> {
        b"tiered cache engines move bytes between tiers. "
            .iter()
            .cycle()
            .copied()
            .take(len)
            .collect()
    }

    #[test]
    fn test_small_payload_skips_compression() {
        let compression = Compression::default();
        let data = compressible_payload(512);

        let (stored, is_compressed) = compression.maybe_compress(&data);
        assert!(!is_compressed);
        assert_eq!(stored, data);
    }

    #[test]
    fn test_large_payload_compresses_and_roundtrips() {
        let compression = Compression::default();
        let data = compressible_payload(64 * 1024);

        let (stored, is_compressed) = compression.maybe_compress(&data);
        assert!(is_compressed);
        assert!(stored.len() < (data.len() as f64 * 0.8) as usize);

        let restored = compression.decompress(&stored).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_gate_rejects_marginal_compression() {
        // Pseudo-random bytes barely compress; the gate should reject the
        // attempt and keep the original.
        let compression = Compression::new(1024, 0.80);
        let mut state = 0x2545F4914F6CDD1Du64;
        let data: Vec<u8> = (0..32 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();

        let (stored, is_compressed) = compression.maybe_compress(&data);
        assert!(!is_compressed);
        assert_eq!(stored, data);
    }

    #[test]
    fn test_gate_boundary_is_strict() {
        // Pin the strict `<` at the exact boundary: derive the gate ratio
        // from the payload's actual compressed size, so a form landing
        // exactly on the threshold is stored uncompressed while one byte
        // of slack keeps it.
        let data = compressible_payload(32 * 1024);
        let (compressed, kept) = Compression::new(0, 1.0).maybe_compress(&data);
        assert!(kept);
        let ratio = compressed.len() as f64 / data.len() as f64;

        let (stored, is_compressed) = Compression::new(0, ratio).maybe_compress(&data);
        assert!(!is_compressed);
        assert_eq!(stored, data);

        let slack = (compressed.len() + 2) as f64 / data.len() as f64;
        let (stored, is_compressed) = Compression::new(0, slack).maybe_compress(&data);
        assert!(is_compressed);
        assert_eq!(stored, compressed);
    }

    #[test]
    fn test_decompress_garbage_is_an_error() {
        let compression = Compression::default();
        let result = compression.decompress(b"\xFF\xFE definitely not lz4");
        assert!(matches!(result, Err(Error::DecompressionFailed(_))));
    }

    proptest! {
        #[test]
        fn prop_kept_compression_roundtrips(seed in any::<Vec<u8>>(), repeat in 1usize..256) {
            // Repetition makes most inputs clear the gate; either way the
            // stored form must restore byte-for-byte when compressed.
            let mut data = Vec::new();
            for _ in 0..repeat {
                data.extend_from_slice(&seed);
            }

            let compression = Compression::new(64, 0.80);
            let (stored, is_compressed) = compression.maybe_compress(&data);
            if is_compressed {
                let restored = compression.decompress(&stored).unwrap();
                prop_assert_eq!(restored, data);
            } else {
                prop_assert_eq!(stored, data);
            }
        }
    }
}
