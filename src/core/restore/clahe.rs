//! Contrast-limited adaptive histogram equalization on the luma channel.
//!
//! Chroma is left untouched so colours do not shift.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Tiles per axis
pub const GRID: u32 = 8;
/// Histogram bins are clipped at `CLIP_LIMIT * mean bin height`
pub const CLIP_LIMIT: f64 = 2.0;

/// Equalize the luminance of an RGB raster
pub fn equalize_luma(raster: &RgbImage) -> RgbImage {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return raster.clone();
    }

    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);
    for (p, l) in raster.pixels().zip(luma.pixels_mut()) {
        let (y, cb, cr) = to_ycbcr(p);
        *l = Luma([y.round().clamp(0.0, 255.0) as u8]);
        chroma.push((y, cb, cr));
    }

    let equalized = clahe(&luma, GRID, CLIP_LIMIT);

    let mut out = RgbImage::new(width, height);
    for ((dst, l), &(y, cb, cr)) in out.pixels_mut().zip(equalized.pixels()).zip(&chroma) {
        // carry sub-level luma precision through so flat areas stay flat
        let shifted = l[0] as f64 + (y - y.round());
        *dst = from_ycbcr(shifted, cb, cr);
    }
    out
}

/// CLAHE on an 8-bit grayscale image with bilinear blending between tiles
pub fn clahe(gray: &GrayImage, grid: u32, clip_limit: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    let grid_x = grid.clamp(1, width.max(1));
    let grid_y = grid.clamp(1, height.max(1));
    // Proportional bounds; with grid <= side no tile is empty
    let span = |i: u32, side: u32, count: u32| {
        let start = (i as u64 * side as u64 / count as u64) as u32;
        let end = ((i as u64 + 1) * side as u64 / count as u64) as u32;
        (start, end)
    };

    let mut luts = Vec::with_capacity((grid_x * grid_y) as usize);
    for ty in 0..grid_y {
        let (y0, y1) = span(ty, height, grid_y);
        for tx in 0..grid_x {
            let (x0, x1) = span(tx, width, grid_x);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let tile_w = width as f64 / grid_x as f64;
    let tile_h = height as f64 / grid_y as f64;
    let lut_at = |tx: u32, ty: u32| &luts[(ty * grid_x + tx) as usize];
    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;

        let (tx0, tx1, ax) = neighbours(x, tile_w, grid_x);
        let (ty0, ty1, ay) = neighbours(y, tile_h, grid_y);

        let top = lut_at(tx0, ty0)[v] * (1.0 - ax) + lut_at(tx1, ty0)[v] * ax;
        let bottom = lut_at(tx0, ty1)[v] * (1.0 - ax) + lut_at(tx1, ty1)[v] * ax;
        let blended = top * (1.0 - ay) + bottom * ay;
        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Neighbouring tile indices along one axis and the blend weight
fn neighbours(pos: u32, tile: f64, count: u32) -> (u32, u32, f64) {
    let f = (pos as f64 + 0.5) / tile - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = (f.floor() as u32).min(count - 1);
    let upper = (lower + 1).min(count - 1);
    let weight = if upper == lower { 0.0 } else { f - lower as f64 };
    (lower, upper, weight)
}

/// Clipped, redistributed cumulative histogram of one tile, scaled to 0-255
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f64) -> [f64; 256] {
    let mut hist = [0.0f64; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1.0;
        }
    }

    let n = (x1.saturating_sub(x0) as u64 * y1.saturating_sub(y0) as u64) as f64;
    let mut lut = [0.0f64; 256];
    if n == 0.0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as f64;
        }
        return lut;
    }

    let limit = (clip_limit * n / 256.0).max(1.0);
    let mut excess = 0.0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256.0;

    let mut cumulative = 0.0;
    for (bin, v) in hist.iter().zip(lut.iter_mut()) {
        cumulative += bin + share;
        *v = cumulative * 255.0 / n;
    }
    lut
}

fn to_ycbcr(p: &Rgb<u8>) -> (f64, f64, f64) {
    let (r, g, b) = (p[0] as f64, p[1] as f64, p[2] as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

fn from_ycbcr(y: f64, cb: f64, cr: f64) -> Rgb<u8> {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    let c = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Rgb([c(r), c(g), c(b)])
}
