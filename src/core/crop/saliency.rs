//! Frequency-tuned saliency.
//!
//! A pixel is salient when its slightly blurred colour is far from the mean
//! colour of the whole image. Computed on a small copy; the cropper only
//! needs the centroid.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

const ANALYSIS_SIDE: u32 = 128;
const BLUR_SIGMA: f32 = 1.0;

/// Saliency map (0-255) of a downsampled copy of `raster`
pub fn saliency_map(raster: &RgbImage) -> GrayImage {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(0, 0);
    }

    let scale = (width.max(height) as f64 / ANALYSIS_SIDE as f64).max(1.0);
    let small_w = ((width as f64 / scale).round() as u32).max(1);
    let small_h = ((height as f64 / scale).round() as u32).max(1);
    let small = image::imageops::thumbnail(raster, small_w, small_h);
    let blurred = gaussian_blur_f32(&small, BLUR_SIGMA);

    let n = (small_w * small_h) as f64;
    let mut mean = [0.0f64; 3];
    for p in small.pixels() {
        for c in 0..3 {
            mean[c] += p[c] as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }

    let distances: Vec<f64> = blurred
        .pixels()
        .map(|p| {
            (0..3)
                .map(|c| (p[c] as f64 - mean[c]).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    let peak = distances.iter().cloned().fold(0.0, f64::max);

    let mut map = GrayImage::new(small_w, small_h);
    if peak > 0.0 {
        for (pixel, d) in map.pixels_mut().zip(&distances) {
            *pixel = Luma([(255.0 * d / peak).round() as u8]);
        }
    }
    map
}

/// Saliency-weighted centroid, in `raster` coordinates.
///
/// A map with no salient pixel yields the raster centre.
pub fn saliency_centroid(raster: &RgbImage) -> (f64, f64) {
    let (width, height) = raster.dimensions();
    let center = (width as f64 / 2.0, height as f64 / 2.0);

    let map = saliency_map(raster);
    let (map_w, map_h) = map.dimensions();
    if map_w == 0 || map_h == 0 {
        return center;
    }

    let mut total = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for (x, y, p) in map.enumerate_pixels() {
        // squared, so a weak background response barely contributes
        let w = (p[0] as f64 / 255.0).powi(2);
        total += w;
        sx += w * (x as f64 + 0.5);
        sy += w * (y as f64 + 0.5);
    }
    if total == 0.0 {
        return center;
    }

    (
        sx / total * width as f64 / map_w as f64,
        sy / total * height as f64 / map_h as f64,
    )
}
