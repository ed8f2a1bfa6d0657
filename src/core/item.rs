//! Per-image scan record shared by the resolver, exporter and reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::hasher::ImageHashValue;
use crate::core::quality::QualityScore;

/// Scan verdict of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Pass,
    Fail,
    Duplicate,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Pass => write!(f, "PASS"),
            ScanStatus::Fail => write!(f, "FAIL"),
            ScanStatus::Duplicate => write!(f, "DUPLICATE"),
        }
    }
}

/// A scored, hashed source image.
///
/// `status` and `duplicate_of` are set once by the dedup resolver after the
/// whole directory was scanned and are read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    /// Path relative to the source root, forward slashes. Unique key.
    pub name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub megapixels: f64,
    pub score: QualityScore,
    pub hash: ImageHashValue,
    pub status: ScanStatus,
    /// Name of the earlier item this one duplicates
    pub duplicate_of: Option<String>,
    /// Why the geometry gate failed, if it did
    pub fail_reason: Option<String>,
}

impl ScanItem {
    /// True when the geometry gate passed, whatever the final status
    pub fn geometry_passed(&self) -> bool {
        self.fail_reason.is_none()
    }
}

/// Output folder an item is exported to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportCategory {
    Pass,
    Rescued,
    Maybe,
    Fail,
    Duplicates,
}

impl ExportCategory {
    pub const ALL: [ExportCategory; 5] = [
        ExportCategory::Pass,
        ExportCategory::Rescued,
        ExportCategory::Maybe,
        ExportCategory::Fail,
        ExportCategory::Duplicates,
    ];

    /// Subdirectory name in the output folder
    pub fn dir_name(&self) -> &'static str {
        match self {
            ExportCategory::Pass => "pass",
            ExportCategory::Rescued => "rescued",
            ExportCategory::Maybe => "maybe",
            ExportCategory::Fail => "fail",
            ExportCategory::Duplicates => "duplicates",
        }
    }

    /// Accepted images go into the training set candidates
    pub fn is_accepted(&self) -> bool {
        matches!(self, ExportCategory::Pass | ExportCategory::Rescued)
    }
}

impl fmt::Display for ExportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Per-item export verdict; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportDecision {
    pub accepted: bool,
    pub bucket: u32,
    pub category: ExportCategory,
    pub selected_for_training: bool,
}
