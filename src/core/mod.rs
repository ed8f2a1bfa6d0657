//! # Core Module
//!
//! The GUI-agnostic curation engine.
//!
//! ## Modules
//! - `scanner` - Discovers source images in a directory tree
//! - `normalize` - Decodes to upright, opaque sRGB rasters
//! - `quality` - Sharpness, contrast and noise scoring plus the geometry gate
//! - `hasher` - Perceptual hashes for near-duplicate detection
//! - `dedup` - Greedy duplicate resolution and keeper selection
//! - `crop` - Face/saliency square crops and letterboxed buckets
//! - `restore` - Auto-fix for images that did not pass
//! - `selection` - Include/exclude/min-score training gate
//! - `caption` - Optional captioning service boundary
//! - `metadata` - EXIF orientation in, metadata template out
//! - `reporter` - Manifest and per-item reports
//! - `pipeline` - Scan and export orchestration

pub mod caption;
pub mod crop;
pub mod dedup;
pub mod hasher;
pub mod item;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod reporter;
pub mod restore;
pub mod scanner;
pub mod selection;

// Re-export commonly used types
pub use item::{ExportCategory, ExportDecision, ScanItem, ScanStatus};
pub use pipeline::{ExportOrchestrator, ExportReport, ScanOrchestrator, ScanReport};
pub use quality::QualityScore;
