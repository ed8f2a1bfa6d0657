//! Hash value type and comparison trait.

use crate::error::HashError;
use serde::{Deserialize, Serialize};

/// A computed perceptual hash that can be compared
pub trait PerceptualHash: Clone + Send + Sync {
    /// Hamming distance to another hash of the same width.
    fn distance(&self, other: &Self) -> u32;

    /// Get the raw hash bytes
    fn as_bytes(&self) -> &[u8];

    /// Number of meaningful bits
    fn bit_count(&self) -> u32;

    /// Get the hash as a hexadecimal string
    fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Similarity as a percentage (0-100)
    fn similarity(&self, other: &Self) -> f64 {
        let max_distance = self.bit_count();
        if max_distance == 0 {
            return 100.0;
        }
        (1.0 - (self.distance(other) as f64 / max_distance as f64)) * 100.0
    }
}

/// Fixed-width bit vector produced by the perceptual hasher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashValue {
    bytes: Vec<u8>,
    bits: u32,
}

impl ImageHashValue {
    /// Wrap raw bytes holding `bits` meaningful bits
    pub fn new(bytes: Vec<u8>, bits: u32) -> Self {
        Self { bytes, bits }
    }

    /// Distance that refuses to compare hashes of different widths.
    pub fn try_distance(&self, other: &Self) -> Result<u32, HashError> {
        if self.bits != other.bits {
            return Err(HashError::WidthMismatch {
                left: self.bits,
                right: other.bits,
            });
        }
        Ok(self.distance(other))
    }
}

impl PerceptualHash for ImageHashValue {
    fn distance(&self, other: &Self) -> u32 {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bit_count(&self) -> u32 {
        self.bits
    }
}
