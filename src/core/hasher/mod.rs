//! # Hasher Module
//!
//! Frequency-domain perceptual hashing used for near-duplicate detection.
//!
//! ## How It Works
//! 1. Convert to grayscale and shrink to a small square
//! 2. Apply a DCT and keep the low-frequency block
//! 3. Set each bit by comparing a coefficient against the block mean
//! 4. Compare hashes using Hamming distance
//!
//! The hash width is fixed for a whole run (`hash_size^2` bits, 256 by
//! default). Hashes produced with different widths are not comparable; a
//! settings change invalidates every stored hash.

mod perceptual;
mod traits;

pub use perceptual::PerceptualHasher;
pub use traits::{ImageHashValue, PerceptualHash};
