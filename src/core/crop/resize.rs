//! SIMD-accelerated Lanczos resizing of RGB rasters.
//!
//! Uses fast_image_resize, which picks AVX2/NEON code paths when available.

use crate::error::TransformError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;

/// Reusable resizer; keep one per task to avoid reallocating buffers
pub struct LanczosResizer {
    resizer: Resizer,
}

impl LanczosResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Resize to exactly `width` x `height` with a Lanczos3 kernel
    pub fn resize(
        &mut self,
        raster: &RgbImage,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, TransformError> {
        let (src_width, src_height) = raster.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(TransformError::InvalidDimensions {
                width: src_width,
                height: src_height,
            });
        }
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidDimensions { width, height });
        }
        if (src_width, src_height) == (width, height) {
            return Ok(raster.clone());
        }

        let src = Image::from_vec_u8(
            src_width,
            src_height,
            raster.as_raw().clone(),
            PixelType::U8x3,
        )
        .map_err(|e| TransformError::Resize(format!("source buffer: {}", e)))?;
        let mut dst = Image::new(width, height, PixelType::U8x3);

        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
        self.resizer
            .resize(&src, &mut dst, &options)
            .map_err(|e| TransformError::Resize(e.to_string()))?;

        RgbImage::from_raw(width, height, dst.into_vec())
            .ok_or_else(|| TransformError::Resize("result buffer has wrong size".to_string()))
    }
}

impl Default for LanczosResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function for one-off resizing
pub fn resize_lanczos(raster: &RgbImage, width: u32, height: u32) -> Result<RgbImage, TransformError> {
    LanczosResizer::new().resize(raster, width, height)
}
