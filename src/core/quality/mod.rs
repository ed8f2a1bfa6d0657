//! # Quality Module
//!
//! Scores a raster for technical quality: sharpness from Laplacian variance,
//! contrast from the occupied histogram span, and noise from the flattest
//! patches of the image. The composite is a weighted sum of the three.
//!
//! Scoring is pure: the same raster and parameters always produce a
//! bit-identical [`QualityScore`].

mod rules;

pub use rules::{geometry_failure, passes_basic_rules};

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Side of the square patches used for noise estimation
const NOISE_PATCH: u32 = 32;
/// Patches whose Laplacian variance is below this count as textureless
const FLAT_PATCH_VARIANCE: f64 = 5.0;

/// Weights of the composite score. They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub sharpness: f64,
    pub contrast: f64,
    pub noise: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sharpness: 0.5,
            contrast: 0.3,
            noise: 0.2,
        }
    }
}

/// Everything [`score`] needs besides the raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    /// Laplacian variance mapping to sharpness 100
    pub target_sharpness: f64,
    /// Noise std mapping to noise score 0
    pub noise_ceiling: f64,
    pub weights: ScoreWeights,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            target_sharpness: 150.0,
            noise_ceiling: 12.0,
            weights: ScoreWeights::default(),
        }
    }
}

/// Quality metrics for an image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Sharpness, 0-100
    pub sharpness: f64,
    /// Tonal range usage, 0-100
    pub contrast: f64,
    /// Cleanliness, 0-100 (100 = no measurable noise)
    pub noise: f64,
    /// Weighted composite
    #[serde(rename = "final")]
    pub final_score: f64,
    /// Raw Laplacian variance of the grayscale image
    pub laplacian_variance: f64,
    /// Estimated noise standard deviation in 8-bit levels
    pub noise_std: f64,
}

impl QualityScore {
    /// Number of the three component metrics strictly below `floor`
    pub fn metrics_below(&self, floor: f64) -> usize {
        [self.sharpness, self.contrast, self.noise]
            .iter()
            .filter(|&&m| m < floor)
            .count()
    }
}

/// Score a raster
pub fn score(raster: &RgbImage, params: &ScoringParams) -> QualityScore {
    let gray = image::imageops::grayscale(raster);

    let laplacian_variance = laplacian_variance(&gray);
    let sharpness = (100.0 * laplacian_variance / params.target_sharpness).min(100.0);
    let contrast = histogram_contrast(&gray);
    let noise_std = estimate_noise_std(&gray);
    let noise = ((1.0 - noise_std / params.noise_ceiling) * 100.0).max(0.0);

    let w = params.weights;
    let final_score = w.sharpness * sharpness + w.contrast * contrast + w.noise * noise;

    QualityScore {
        sharpness,
        contrast,
        noise,
        final_score,
        laplacian_variance,
        noise_std,
    }
}

/// Variance of the 4-neighbour Laplacian over the interior pixels.
///
/// Sharp images have well-defined edges and therefore a wide spread of
/// Laplacian responses.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    region_laplacian_variance(gray, 0, 0, width, height)
}

/// Laplacian variance of the `w`x`h` region at (`x0`, `y0`)
fn region_laplacian_variance(gray: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    if w < 3 || h < 3 {
        return 0.0;
    }

    let stride = gray.width() as usize;
    let raw = gray.as_raw();
    let px = |x: u32, y: u32| raw[y as usize * stride + x as usize] as f64;

    // Kernel: [0, 1, 0; 1, -4, 1; 0, 1, 0]
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0usize;
    for y in y0 + 1..y0 + h - 1 {
        for x in x0 + 1..x0 + w - 1 {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            n += 1;
        }
    }

    let n = n as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Span between the lowest and highest occupied histogram bins, as 0-100
pub fn histogram_contrast(gray: &GrayImage) -> f64 {
    let mut histogram = [0u64; 256];
    for p in gray.as_raw() {
        histogram[*p as usize] += 1;
    }

    let lowest = histogram.iter().position(|&c| c > 0);
    let highest = histogram.iter().rposition(|&c| c > 0);
    match (lowest, highest) {
        (Some(lo), Some(hi)) => 100.0 * (hi - lo + 1) as f64 / 256.0,
        _ => 0.0,
    }
}

/// Estimate sensor/compression noise as the smallest pixel standard
/// deviation among textureless patches.
///
/// Patches containing edges are skipped because their structure would be
/// mistaken for noise. Without any flat patch the whole-image standard
/// deviation is used.
pub fn estimate_noise_std(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    let step = (NOISE_PATCH / 2).max(8);

    let mut best: Option<f64> = None;
    if width >= NOISE_PATCH && height >= NOISE_PATCH {
        let mut y = 0;
        while y + NOISE_PATCH <= height {
            let mut x = 0;
            while x + NOISE_PATCH <= width {
                if region_laplacian_variance(gray, x, y, NOISE_PATCH, NOISE_PATCH)
                    < FLAT_PATCH_VARIANCE
                {
                    let std = region_std(gray, x, y, NOISE_PATCH, NOISE_PATCH);
                    if best.map_or(true, |b| std < b) {
                        best = Some(std);
                    }
                }
                x += step;
            }
            y += step;
        }
    }

    best.unwrap_or_else(|| region_std(gray, 0, 0, width, height))
}

fn region_std(gray: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    if w == 0 || h == 0 {
        return 0.0;
    }

    let stride = gray.width() as usize;
    let raw = gray.as_raw();
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in y0..y0 + h {
        let row = &raw[y as usize * stride + x0 as usize..y as usize * stride + (x0 + w) as usize];
        for &p in row {
            let v = p as f64;
            sum += v;
            sum_sq += v * v;
        }
    }

    let n = (w as f64) * (h as f64);
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}
