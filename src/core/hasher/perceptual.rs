//! DCT-based perceptual hash (pHash) via the image_hasher crate.
//!
//! Robust to scaling, re-encoding and mild brightness changes, which is what
//! near-duplicate pruning of a training set needs.

use super::traits::ImageHashValue;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

/// Perceptual hasher with a fixed width for the lifetime of a run
pub struct PerceptualHasher {
    hash_size: u32,
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Hasher producing `hash_size * hash_size` bits
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();

        Self { hash_size, hasher }
    }

    /// Bits per hash
    pub fn bit_width(&self) -> u32 {
        self.hash_size * self.hash_size
    }

    pub fn hash(&self, image: &DynamicImage) -> ImageHashValue {
        let hash = self.hasher.hash_image(image);
        ImageHashValue::new(hash.as_bytes().to_vec(), self.bit_width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::PerceptualHash;
    use image::{ImageBuffer, Rgb};

    fn pattern(offset: u8) -> DynamicImage {
        let img = ImageBuffer::from_fn(128, 128, |x, y| {
            let v: u8 = if (x / 16 + y / 32) % 2 == 0 { 40 } else { 200 };
            Rgb([v, v.saturating_add(offset), v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn other_pattern() -> DynamicImage {
        let img = ImageBuffer::from_fn(128, 128, |x, y| {
            let v = ((x * 2 + y) % 256) as u8;
            Rgb([v, 255 - v, v / 2])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn default_width_is_256_bits() {
        let hasher = PerceptualHasher::new(16);
        let hash = hasher.hash(&pattern(0));
        assert_eq!(hash.bit_count(), 256);
        assert_eq!(hash.as_bytes().len(), 32);
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = PerceptualHasher::new(16);
        assert_eq!(hasher.hash(&pattern(0)).distance(&hasher.hash(&pattern(0))), 0);
    }

    #[test]
    fn small_colour_shift_stays_close() {
        let hasher = PerceptualHasher::new(16);
        let a = hasher.hash(&pattern(0));
        let b = hasher.hash(&pattern(4));
        let c = hasher.hash(&other_pattern());
        assert!(a.distance(&b) < a.distance(&c));
    }

    #[test]
    fn rescaled_copy_is_near_duplicate() {
        let hasher = PerceptualHasher::new(16);
        let original = pattern(0);
        let smaller = original.resize_exact(64, 64, image::imageops::FilterType::Triangle);
        assert!(hasher.hash(&original).distance(&hasher.hash(&smaller)) <= 16);
    }
}
