//! Bounding-box crops suggested by a vision model.

use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{BoundingBox, CaptionClient};
use crate::core::normalize::normalize_file;
use crate::error::{ConfigError, ExportError};

/// What happened to each requested image
#[derive(Debug, Default)]
pub struct VlmCropReport {
    /// Crops written to the output directory
    pub written: Vec<PathBuf>,
    /// Images left alone, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Ask `client` for a box per image and write the clamped crops as PNG.
///
/// Only an unusable output directory fails the whole call; per-image
/// problems land in [`VlmCropReport::skipped`].
pub fn vlm_crop(
    images: &[PathBuf],
    prompt: &str,
    out_dir: &Path,
    client: &dyn CaptionClient,
) -> Result<VlmCropReport, ConfigError> {
    std::fs::create_dir_all(out_dir).map_err(|source| ConfigError::OutputDirectory {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut report = VlmCropReport::default();
    for image in images {
        match crop_one(image, prompt, out_dir, client) {
            Ok(path) => {
                info!("Cropped {} -> {}", image.display(), path.display());
                report.written.push(path);
            }
            Err(reason) => {
                warn!("Skipping {}: {}", image.display(), reason);
                report.skipped.push((image.clone(), reason));
            }
        }
    }
    Ok(report)
}

fn crop_one(
    image: &Path,
    prompt: &str,
    out_dir: &Path,
    client: &dyn CaptionClient,
) -> Result<PathBuf, String> {
    let bbox = client
        .bounding_box(image, prompt)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "no bounding box in reply".to_string())?;

    let raster = normalize_file(image).map_err(|e| e.to_string())?;
    let (x, y, w, h) = clamp_box(bbox, raster.width(), raster.height())
        .ok_or_else(|| format!("empty box {:?}", bbox))?;
    let crop = image::imageops::crop_imm(&raster, x, y, w, h).to_image();

    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let target = out_dir.join(format!("{}_crop.png", stem));

    write_png(DynamicImage::ImageRgb8(crop), &target).map_err(|e| e.to_string())?;
    Ok(target)
}

/// Order the corners and clamp them into the raster; `None` if nothing remains
pub(crate) fn clamp_box(bbox: BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let [x1, y1, x2, y2] = bbox;
    let clamp_x = |v: i64| v.clamp(0, width as i64) as u32;
    let clamp_y = |v: i64| v.clamp(0, height as i64) as u32;

    let (left, right) = (clamp_x(x1.min(x2)), clamp_x(x1.max(x2)));
    let (top, bottom) = (clamp_y(y1.min(y2)), clamp_y(y1.max(y2)));
    if right <= left || bottom <= top {
        return None;
    }
    Some((left, top, right - left, bottom - top))
}

fn write_png(image: DynamicImage, target: &Path) -> Result<(), ExportError> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| ExportError::Encode {
            path: target.to_path_buf(),
            reason: e.to_string(),
        })?;

    let io_error = |source| ExportError::Io {
        path: target.to_path_buf(),
        source,
    };
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
    staged.write_all(bytes.get_ref()).map_err(io_error)?;
    staged.persist(target).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionError;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    struct FixedBox(Option<BoundingBox>);

    impl CaptionClient for FixedBox {
        fn describe(&self, _: &Path) -> Result<String, CaptionError> {
            Ok(String::new())
        }
        fn caption(&self, _: &Path, _: &str) -> Result<String, CaptionError> {
            Ok(String::new())
        }
        fn tags(&self, _: &Path, _: &str) -> Result<String, CaptionError> {
            Ok(String::new())
        }
        fn bounding_box(&self, _: &Path, _: &str) -> Result<Option<BoundingBox>, CaptionError> {
            Ok(self.0)
        }
    }

    fn source(dir: &Path) -> PathBuf {
        let path = dir.join("photo.png");
        RgbImage::from_pixel(100, 80, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn clamp_orders_and_limits() {
        assert_eq!(clamp_box([90, 70, -5, 10], 100, 80), Some((0, 10, 90, 60)));
        assert_eq!(clamp_box([0, 0, 500, 500], 100, 80), Some((0, 0, 100, 80)));
        assert_eq!(clamp_box([50, 10, 50, 40], 100, 80), None);
    }

    #[test]
    fn writes_clamped_crop() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path());
        let out = dir.path().join("crops");

        let report = vlm_crop(&[src], "the subject", &out, &FixedBox(Some([10, 10, 60, 500]))).unwrap();
        assert_eq!(report.written.len(), 1);
        let crop = image::open(&report.written[0]).unwrap();
        assert_eq!((crop.width(), crop.height()), (50, 70));
    }

    #[test]
    fn missing_box_is_skipped() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path());
        let report = vlm_crop(&[src], "x", &dir.path().join("out"), &FixedBox(None)).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn disabled_client_skips_everything() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path());
        let report = vlm_crop(&[src], "x", dir.path(), &super::super::NullCaptionClient).unwrap();
        assert!(report.skipped[0].1.contains("disabled"));
    }
}
