//! # Restore Module
//!
//! Auto-fix: a fixed sequence of repairs for images that did not pass,
//! each stage conditional on the pre-fix score.
//!
//! ## Stages
//! 1. Median denoise when the noise estimate is high
//! 2. CLAHE on luma (always)
//! 3. Unsharp mask when the image is soft
//! 4. Lanczos upscale to the minimum side, unless that needs too large a factor
//! 5. Square crop to the target side
//!
//! The result is re-scored. Accepting or rejecting it is up to the caller.
//! [`deblock`] is separate: the exporter applies it to JPEG sources before
//! anything else looks at them.

mod clahe;

pub use clahe::{clahe, equalize_luma};

use image::{Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::core::crop::{bucket_square, resize_lanczos, square_crop, FaceDetector};
use crate::core::quality::{score, QualityScore, ScoringParams};
use crate::error::TransformError;

const UNSHARP_SIGMA: f32 = 1.2;
const UNSHARP_AMOUNT: f32 = 0.8;

/// Inputs to [`auto_fix`]
#[derive(Debug, Clone, Copy)]
pub struct AutoFixParams {
    pub scoring: ScoringParams,
    pub pass_threshold: f64,
    pub min_side: u32,
    /// Side of the square the fixed image is cropped to
    pub target_side: u32,
    pub max_upscale_factor: f64,
    pub intelligent_crop: bool,
}

/// One applied (or deliberately skipped) restoration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStage {
    Denoise,
    Equalize,
    Sharpen,
    Upscale,
    UpscaleSkipped,
    Crop,
}

impl fmt::Display for FixStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixStage::Denoise => "denoise",
            FixStage::Equalize => "clahe",
            FixStage::Sharpen => "sharpen",
            FixStage::Upscale => "upscale",
            FixStage::UpscaleSkipped => "upscale skipped",
            FixStage::Crop => "crop",
        };
        write!(f, "{}", name)
    }
}

/// Repaired raster plus before/after measurements
#[derive(Debug, Clone)]
pub struct AutoFixOutcome {
    pub raster: RgbImage,
    pub pre: QualityScore,
    pub post: QualityScore,
    pub stages: Vec<FixStage>,
}

/// Run the restoration sequence on a copy of `raster`
pub fn auto_fix(
    raster: &RgbImage,
    params: &AutoFixParams,
    detector: &dyn FaceDetector,
) -> Result<AutoFixOutcome, TransformError> {
    let pre = score(raster, &params.scoring);
    let mut stages = Vec::new();
    let mut working = raster.clone();

    if pre.noise_std > 0.75 * params.scoring.noise_ceiling {
        working = median_filter(&working, 1, 1);
        stages.push(FixStage::Denoise);
    }

    working = equalize_luma(&working);
    stages.push(FixStage::Equalize);

    if pre.sharpness < 0.6 * params.pass_threshold {
        working = unsharp_mask(&working, UNSHARP_SIGMA, UNSHARP_AMOUNT);
        stages.push(FixStage::Sharpen);
    }

    let (width, height) = working.dimensions();
    let shorter = width.min(height);
    let mut crop_side = params.target_side;
    if shorter < params.min_side {
        let factor = params.min_side as f64 / shorter.max(1) as f64;
        if factor <= params.max_upscale_factor {
            let (w, h) = upscaled_dimensions(width, height, params.min_side);
            working = resize_lanczos(&working, w, h)?;
            stages.push(FixStage::Upscale);
        } else {
            debug!(
                "Upscale x{:.2} exceeds limit x{:.2}",
                factor, params.max_upscale_factor
            );
            // Never magnify past the limit through the crop either
            crop_side = crop_side.min(shorter);
            stages.push(FixStage::UpscaleSkipped);
        }
    }

    working = if params.intelligent_crop {
        square_crop(&working, crop_side, detector)?
    } else {
        bucket_square(&working, crop_side)?
    };
    stages.push(FixStage::Crop);

    let post = score(&working, &params.scoring);
    Ok(AutoFixOutcome {
        raster: working,
        pre,
        post,
        stages,
    })
}

/// Dimensions with the shorter side scaled to exactly `min_side`
fn upscaled_dimensions(width: u32, height: u32, min_side: u32) -> (u32, u32) {
    if width <= height {
        let h = (height as f64 * min_side as f64 / width as f64).round() as u32;
        (min_side, h.max(min_side))
    } else {
        let w = (width as f64 * min_side as f64 / height as f64).round() as u32;
        (w.max(min_side), min_side)
    }
}

/// Light block-artifact suppression: half-strength 3x3 median
pub fn deblock(raster: &RgbImage) -> RgbImage {
    let smoothed = median_filter(raster, 1, 1);
    let mut out = raster.clone();
    for (dst, s) in out.pixels_mut().zip(smoothed.pixels()) {
        for c in 0..3 {
            dst[c] = ((dst[c] as u16 + s[c] as u16 + 1) / 2) as u8;
        }
    }
    out
}

/// `raster + amount * (raster - blur(raster))`
pub fn unsharp_mask(raster: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    let blurred = gaussian_blur_f32(raster, sigma);
    let mut out = raster.clone();
    for (dst, b) in out.pixels_mut().zip(blurred.pixels()) {
        let sharpened = |o: u8, b: u8| {
            let o = o as f32;
            (o + amount * (o - b as f32)).round().clamp(0.0, 255.0) as u8
        };
        *dst = Rgb([
            sharpened(dst[0], b[0]),
            sharpened(dst[1], b[1]),
            sharpened(dst[2], b[2]),
        ]);
    }
    out
}
