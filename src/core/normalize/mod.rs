//! # Normalize Module
//!
//! Turns raw file bytes into the canonical raster every later stage works
//! on: upright, opaque, sRGB, 8-bit RGB.
//!
//! ## Steps
//! 1. Decode (format sniffed from content, not extension)
//! 2. Apply EXIF orientation
//! 3. Composite any alpha channel onto black
//! 4. Convert an embedded ICC profile to sRGB; on failure keep the plain
//!    RGB conversion

use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use lcms2::{Intent, PixelFormat, Profile, Transform};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::core::metadata::{apply_orientation, read_orientation};
use crate::error::{DecodeError, TransformError};

/// Decode and normalize an in-memory image
pub fn normalize(raw: &[u8]) -> Result<RgbImage, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| DecodeError::Malformed {
            reason: e.to_string(),
        })?;
    let mut decoder = reader.into_decoder().map_err(malformed)?;
    // A broken profile chunk is not worth rejecting the image over
    let icc = decoder.icc_profile().unwrap_or(None);
    let image = DynamicImage::from_decoder(decoder).map_err(malformed)?;

    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Empty);
    }

    let image = apply_orientation(image, read_orientation(raw));
    let mut raster = flatten_on_black(image);

    if let Some(icc) = icc {
        if let Err(e) = convert_to_srgb(&mut raster, &icc) {
            debug!("Keeping untransformed RGB: {}", e);
        }
    }

    Ok(raster)
}

/// Read a file and normalize it
pub fn normalize_file(path: &Path) -> Result<RgbImage, DecodeError> {
    let raw = std::fs::read(path).map_err(|source| DecodeError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    normalize(&raw)
}

fn malformed(e: image::ImageError) -> DecodeError {
    DecodeError::Malformed {
        reason: e.to_string(),
    }
}

/// Drop alpha by compositing over an opaque black background
fn flatten_on_black(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// In-place conversion from an embedded ICC profile to sRGB
pub fn convert_to_srgb(raster: &mut RgbImage, icc: &[u8]) -> Result<(), TransformError> {
    let input = Profile::new_icc(icc).map_err(|e| TransformError::Profile(e.to_string()))?;
    let srgb = Profile::new_srgb();
    let transform: Transform<[u8; 3], [u8; 3]> = Transform::new(
        &input,
        PixelFormat::RGB_8,
        &srgb,
        PixelFormat::RGB_8,
        Intent::Perceptual,
    )
    .map_err(|e| TransformError::Profile(e.to_string()))?;

    let mut pixels: Vec<[u8; 3]> = raster
        .as_raw()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    transform.transform_in_place(&mut pixels);

    for (dst, src) in raster.pixels_mut().zip(pixels) {
        dst.0 = src;
    }
    Ok(())
}
