//! Per-SSTable bloom filters.
//!
//! Every SSTable generation carries a bloom filter over its keys so that
//! point lookups can skip generations that certainly do not contain the
//! key. A positive answer is necessary but not sufficient; a negative
//! answer is authoritative.
//!
//! Sizing follows the standard derivation from the expected element count
//! `n` and the target false-positive rate `p`:
//! `m = ⌈n · |ln p| / (ln 2)²⌉` bits and `k = ⌈(m/n) · ln 2⌉` seeded hash
//! functions. The serialized form carries the bitset together with its
//! size and the hash seeds, so a deserialized filter reproduces exactly
//! the same bit indices for the same keys.


use bloomfilter::Bloom;
use thiserror::Error;

/// Errors returned by filter operations.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The requested sizing parameters cannot produce a filter.
    #[error("invalid filter parameters: {0}")]
    InvalidParams(String),

    /// Serialized filter bytes did not decode.
    #[error("corrupt filter: {0}")]
    Corrupt(String),
}

/// A bloom filter over opaque byte keys.
pub struct Filter {
    bloom: Bloom<Vec<u8>>,
}

impl Filter {
    /// Builds an empty filter sized for `expected_elements` keys at the
    /// given false-positive rate.
    pub fn new(expected_elements: usize, false_positive_rate: f64) -> Result<Self, FilterError> {
        let bloom = Bloom::new_for_fp_rate(expected_elements, false_positive_rate)
            .map_err(|e| FilterError::InvalidParams(e.to_string()))?;
        Ok(Self { bloom })
    }

    /// Sets all `k` bit positions for `key`.
    pub fn add(&mut self, key: &[u8]) {
        self.bloom.set(&key.to_vec());
    }

    /// Returns `false` if any of `key`'s bit positions is unset.
    ///
    /// An empty filter (nothing added) answers `false` for every key.
    pub fn query(&self, key: &[u8]) -> bool {
        self.bloom.check(&key.to_vec())
    }

    /// Zeroes the bitset, keeping size and seeds.
    pub fn clear(&mut self) {
        self.bloom.clear();
    }

    /// Serializes the bitset, its size, and the hash seeds.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bloom.as_slice().to_vec()
    }

    /// Reconstructs a filter from [`Filter::to_bytes`] output.
    ///
    /// The embedded seeds make the reconstructed filter answer queries
    /// identically to the original.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let bloom = Bloom::from_slice(bytes).map_err(|e| FilterError::Corrupt(e.to_string()))?;
        Ok(Self { bloom })
    }
}
