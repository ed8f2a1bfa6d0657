//! # Scanner Module
//!
//! Discovers source images under a dataset directory.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg)
//! - PNG (.png)
//! - WebP (.webp)
//! - GIF (.gif)
//! - BMP (.bmp)
//! - TIFF (.tiff, .tif)
//!
//! ## Example
//! ```rust,ignore
//! use dataset_curator::core::scanner::{ImageScanner, WalkConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(WalkConfig::default());
//! let found = scanner.discover(Path::new("/datasets/raw"))?;
//! ```

mod filter;
mod walker;

pub use filter::ImageFilter;
pub use walker::{WalkConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A discovered source image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceImage {
    /// Absolute (or root-joined) path
    pub path: PathBuf,
    /// Path relative to the source root with forward slashes
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Format guessed from the extension
    pub format: ImageFormat,
}

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::WebP,
            "gif" => ImageFormat::Gif,
            "bmp" => ImageFormat::Bmp,
            "tiff" | "tif" => ImageFormat::Tiff,
            _ => ImageFormat::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Check if this format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, ImageFormat::Unknown)
    }
}

/// Result of walking a source directory
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Images sorted by name
    pub images: Vec<SourceImage>,
    /// Non-fatal errors (unreadable entries)
    pub errors: Vec<ScanError>,
}

/// Item name: `path` relative to `root`, joined with forward slashes
pub fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Trait for image discovery
///
/// Implement this trait to feed the orchestrator from somewhere else
/// (e.g. a fixed list in tests).
pub trait ImageScanner: Send + Sync {
    /// Discover images below `root`
    fn discover(&self, root: &Path) -> Result<DiscoveryResult, ScanError>;

    /// Discover with error reporting via events
    fn discover_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<DiscoveryResult, ScanError>;
}
