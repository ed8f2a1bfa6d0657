//! # Crop Module
//!
//! Square output framing.
//!
//! - [`square_crop`]: downscale, then centre a square window on a detected
//!   face (window = twice the larger face side) or on the saliency centroid
//!   (window = shorter side), then resize to exactly the target side
//! - [`bucket_square`]: scale the long side to the bucket and pad the short
//!   side with black

mod face;
mod resize;
mod saliency;

pub use face::{FaceDetector, FaceRegion, NoFaceDetector, SkinRegionDetector};
pub use resize::{resize_lanczos, LanczosResizer};
pub use saliency::{saliency_centroid, saliency_map};

use crate::error::TransformError;
use image::RgbImage;
use tracing::trace;

/// Intelligent square crop, always exactly `target` x `target`
pub fn square_crop(
    raster: &RgbImage,
    target: u32,
    detector: &dyn FaceDetector,
) -> Result<RgbImage, TransformError> {
    check_dimensions(raster, target)?;
    let mut resizer = LanczosResizer::new();

    let (width, height) = raster.dimensions();
    let longer = width.max(height);
    let working = if longer > target {
        let scale = target as f64 / longer as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        resizer.resize(raster, w, h)?
    } else {
        raster.clone()
    };

    let (width, height) = working.dimensions();
    let shorter = width.min(height);
    let (side, (cx, cy)) = match detector.detect(&working) {
        Some(face) => {
            trace!("Face at {:?}", face);
            let side = (face.width.max(face.height) * 2).min(shorter).max(1);
            (side, face.center())
        }
        None => (shorter, saliency_centroid(&working)),
    };

    let x = window_origin(cx, side, width);
    let y = window_origin(cy, side, height);
    let window = image::imageops::crop_imm(&working, x, y, side, side).to_image();

    resizer.resize(&window, target, target)
}

/// Letterboxed square: long side scaled to `side`, short side padded black
pub fn bucket_square(raster: &RgbImage, side: u32) -> Result<RgbImage, TransformError> {
    check_dimensions(raster, side)?;

    let (width, height) = raster.dimensions();
    let scale = side as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, side);
    let h = ((height as f64 * scale).round() as u32).clamp(1, side);
    let scaled = resize_lanczos(raster, w, h)?;

    let mut canvas = RgbImage::new(side, side);
    let x = ((side - w) / 2) as i64;
    let y = ((side - h) / 2) as i64;
    image::imageops::replace(&mut canvas, &scaled, x, y);
    Ok(canvas)
}

fn check_dimensions(raster: &RgbImage, side: u32) -> Result<(), TransformError> {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Err(TransformError::InvalidDimensions { width, height });
    }
    if side == 0 {
        return Err(TransformError::InvalidDimensions {
            width: side,
            height: side,
        });
    }
    Ok(())
}

/// Top-left of a `side` window centred on `center`, kept inside `0..extent`
fn window_origin(center: f64, side: u32, extent: u32) -> u32 {
    let max_origin = extent.saturating_sub(side) as f64;
    (center - side as f64 / 2.0).round().clamp(0.0, max_origin) as u32
}
