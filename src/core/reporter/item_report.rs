//! Plain-text report written for every exported item.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::{self, Write as _};

use crate::core::item::{ExportCategory, ScanStatus};
use crate::core::quality::QualityScore;
use crate::core::restore::FixStage;
use crate::core::selection::GateOutcome;

/// Everything known about one item at the end of its export task
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub name: String,
    pub source: String,
    pub status: ScanStatus,
    pub fail_reason: Option<String>,
    pub duplicate_of: Option<String>,
    pub gate: GateOutcome,
    /// Scan-time score
    pub scan_score: QualityScore,
    /// Before/after scores when auto-fix ran
    pub fix: Option<FixSummary>,
    pub category: ExportCategory,
    pub bucket: u32,
    pub destination: String,
    pub caption: Option<String>,
    pub tags: Option<String>,
    pub generated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixSummary {
    pub pre: QualityScore,
    pub post: QualityScore,
    pub stages: Vec<FixStage>,
}

impl ItemReport {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ItemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "item: {}", self.name)?;
        writeln!(f, "source: {}", self.source)?;
        writeln!(f, "generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f)?;

        writeln!(f, "status: {}", self.status)?;
        if let Some(reason) = &self.fail_reason {
            writeln!(f, "fail reason: {}", reason)?;
        }
        if let Some(root) = &self.duplicate_of {
            writeln!(f, "duplicate of: {}", root)?;
        }
        writeln!(f, "scan score: {}", score_line(&self.scan_score))?;
        writeln!(f)?;

        match &self.fix {
            Some(fix) => {
                writeln!(f, "auto-fix pre: {}", score_line(&fix.pre))?;
                writeln!(f, "auto-fix post: {}", score_line(&fix.post))?;
                let stages = fix
                    .stages
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(" > ");
                writeln!(f, "stages: {}", stages)?;
            }
            None => writeln!(f, "auto-fix: not run")?,
        }
        writeln!(f)?;

        writeln!(f, "[selection]")?;
        writeln!(f, "{}", self.gate)?;
        writeln!(f)?;

        writeln!(f, "category: {}", self.category)?;
        writeln!(f, "bucket: {}", self.bucket)?;
        writeln!(f, "destination: {}", self.destination)?;
        if let Some(caption) = &self.caption {
            writeln!(f, "caption: {}", caption)?;
        }
        if let Some(tags) = &self.tags {
            writeln!(f, "tags: {}", tags)?;
        }
        Ok(())
    }
}

fn score_line(score: &QualityScore) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "final {:.1} (sharpness {:.1}, contrast {:.1}, noise {:.1})",
        score.final_score, score.sharpness, score.contrast, score.noise
    );
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(final_score: f64) -> QualityScore {
        QualityScore {
            sharpness: 100.0,
            contrast: 90.0,
            noise: 80.0,
            final_score,
            laplacian_variance: 300.0,
            noise_std: 2.4,
        }
    }

    fn report(fix: Option<FixSummary>) -> ItemReport {
        ItemReport {
            name: "people/a.png".to_string(),
            source: "/raw/people/a.png".to_string(),
            status: ScanStatus::Fail,
            fail_reason: Some("short side 800 < 1024".to_string()),
            duplicate_of: None,
            gate: GateOutcome {
                excluded_by: None,
                include_required: false,
                include_matched: None,
                score: 96.0,
                threshold: 90.0,
                selected: true,
            },
            scan_score: quality(70.0),
            fix,
            category: ExportCategory::Rescued,
            bucket: 1024,
            destination: "rescued/people-a.jpg".to_string(),
            caption: None,
            tags: None,
            generated_at: Local::now(),
        }
    }

    #[test]
    fn report_lists_scores_and_gate() {
        let text = report(Some(FixSummary {
            pre: quality(70.0),
            post: quality(96.0),
            stages: vec![FixStage::Equalize, FixStage::Upscale, FixStage::Crop],
        }))
        .render();

        assert!(text.contains("status: FAIL"));
        assert!(text.contains("fail reason: short side 800 < 1024"));
        assert!(text.contains("auto-fix post: final 96.0"));
        assert!(text.contains("stages: clahe > upscale > crop"));
        assert!(text.contains("score: 96.0 (threshold 90.0)"));
        assert!(text.contains("selected: true"));
        assert!(text.contains("bucket: 1024"));
    }

    #[test]
    fn report_without_fix_says_so() {
        let text = report(None).render();
        assert!(text.contains("auto-fix: not run"));
        assert!(!text.contains("caption:"));
    }
}
