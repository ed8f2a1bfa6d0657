//! Per-item export category and bucket choice.

use crate::core::item::{ExportCategory, ScanItem};
use crate::core::quality::QualityScore;

/// Gap below the pass threshold that still counts as "maybe"
const MAYBE_GAP: f64 = 5.0;
/// A single component below this (and nothing else) also counts as "maybe"
const METRIC_FLOOR: f64 = 90.0;

/// Auto-fix result as seen by the categorizer
#[derive(Debug, Clone, Copy)]
pub struct FixVerdict {
    pub post: QualityScore,
}

/// True when an item goes to `pass` without any repair
pub fn passes_as_scanned(item: &ScanItem, redundant: bool, pass_threshold: f64) -> bool {
    !redundant && item.geometry_passed() && item.score.final_score >= pass_threshold
}

/// Decide the output folder of one item.
///
/// `redundant` marks a duplicate-group member that is not the keeper.
pub fn categorize(
    item: &ScanItem,
    redundant: bool,
    fix: Option<&FixVerdict>,
    pass_threshold: f64,
) -> ExportCategory {
    if redundant {
        return ExportCategory::Duplicates;
    }
    if passes_as_scanned(item, redundant, pass_threshold) {
        return ExportCategory::Pass;
    }
    if let Some(fix) = fix {
        if fix.post.final_score >= pass_threshold {
            return ExportCategory::Rescued;
        }
    }

    let best = fix.map(|f| &f.post).unwrap_or(&item.score);
    if best.final_score >= pass_threshold - MAYBE_GAP || best.metrics_below(METRIC_FLOOR) == 1 {
        ExportCategory::Maybe
    } else {
        ExportCategory::Fail
    }
}

/// Largest bucket not exceeding `shorter_side`, or the smallest bucket
/// when none fits
pub fn select_bucket(buckets: &[u32], shorter_side: u32) -> u32 {
    buckets
        .iter()
        .copied()
        .filter(|&b| b <= shorter_side)
        .max()
        .or_else(|| buckets.iter().copied().min())
        .unwrap_or(shorter_side)
}
