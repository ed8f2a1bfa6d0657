//! Face-region detection for crop centring.
//!
//! Detectors are plain values handed to the cropper, so every worker can
//! share one without locking.

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

/// Axis-aligned region in raster coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Finds the most prominent face-like region of a raster
pub trait FaceDetector: Send + Sync {
    fn detect(&self, raster: &RgbImage) -> Option<FaceRegion>;
}

/// Detector that never finds anything; cropping then relies on saliency
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceDetector;

impl FaceDetector for NoFaceDetector {
    fn detect(&self, _raster: &RgbImage) -> Option<FaceRegion> {
        None
    }
}

/// Skin-tone blob detector.
///
/// Classifies pixels as skin in YCbCr space on a downsampled copy, keeps the
/// largest connected skin region and accepts it when its box is roughly
/// face-shaped, reasonably filled and at least `min_face` pixels on each side
/// at full resolution.
#[derive(Debug, Clone, Copy)]
pub struct SkinRegionDetector {
    /// Smallest accepted face side, in full-resolution pixels
    pub min_face: u32,
    /// Longer side of the analysis copy
    pub analysis_side: u32,
}

impl Default for SkinRegionDetector {
    fn default() -> Self {
        Self {
            min_face: 64,
            analysis_side: 256,
        }
    }
}

impl SkinRegionDetector {
    fn skin_mask(small: &RgbImage) -> GrayImage {
        GrayImage::from_fn(small.width(), small.height(), |x, y| {
            let [r, g, b] = small.get_pixel(x, y).0;
            Luma([if is_skin(r, g, b) { 255 } else { 0 }])
        })
    }
}

impl FaceDetector for SkinRegionDetector {
    fn detect(&self, raster: &RgbImage) -> Option<FaceRegion> {
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let scale = (width.max(height) as f64 / self.analysis_side.max(1) as f64).max(1.0);
        let small_w = ((width as f64 / scale).round() as u32).max(1);
        let small_h = ((height as f64 / scale).round() as u32).max(1);
        let small = image::imageops::thumbnail(raster, small_w, small_h);

        let mask = Self::skin_mask(&small);
        let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

        // label -> (area, min_x, min_y, max_x, max_y)
        let mut regions: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            let entry = regions.entry(label).or_insert((0, x, y, x, y));
            entry.0 += 1;
            entry.1 = entry.1.min(x);
            entry.2 = entry.2.min(y);
            entry.3 = entry.3.max(x);
            entry.4 = entry.4.max(y);
        }

        // Largest area, smallest label on ties, so results are stable
        let (_, &(area, x0, y0, x1, y1)) = regions
            .iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.0.cmp(a.0)))?;

        let box_w = x1 - x0 + 1;
        let box_h = y1 - y0 + 1;
        let fill = area as f64 / (box_w * box_h) as f64;
        let aspect = box_w as f64 / box_h as f64;
        let coverage = area as f64 / (small_w * small_h) as f64;
        if fill < 0.4 || !(0.5..=1.6).contains(&aspect) || coverage > 0.6 {
            return None;
        }

        let region = FaceRegion {
            x: (x0 as f64 * scale) as u32,
            y: (y0 as f64 * scale) as u32,
            width: ((box_w as f64 * scale).round() as u32).min(width),
            height: ((box_h as f64 * scale).round() as u32).min(height),
        };
        if region.width < self.min_face || region.height < self.min_face {
            return None;
        }
        Some(region)
    }
}

/// Skin classification in YCbCr (ITU-R BT.601)
fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    y > 40.0 && (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
}
