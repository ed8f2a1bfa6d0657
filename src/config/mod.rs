//! # Config Module
//!
//! Plain value structs holding every threshold the engine uses. Nothing is
//! global: each orchestrator receives its configuration explicitly.
//!
//! Settings are stored as JSON. Keys missing from the file keep their
//! defaults, so older settings files stay loadable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::caption::CaptionSettings;
use crate::core::metadata::MetadataTemplate;
use crate::core::quality::{ScoreWeights, ScoringParams};
use crate::core::selection::SelectionGate;
use crate::error::ConfigError;

/// Thresholds for the scan phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Shorter side below this fails the geometry gate
    pub min_side: u32,
    /// Lowest accepted width/height ratio
    pub aspect_min: f64,
    /// Highest accepted width/height ratio
    pub aspect_max: f64,
    /// Laplacian variance that maps to a sharpness score of 100
    pub sharpness_target: f64,
    /// Noise standard deviation that maps to a noise score of 0
    pub noise_ceiling: f64,
    /// Composite score weights
    pub weights: ScoreWeights,
    /// Minimum composite score counted as acceptable
    pub pass_threshold: f64,
    /// Maximum Hamming distance for two images to count as duplicates
    pub dedupe_tol: u32,
    /// Perceptual hash side; the hash has `hash_size^2` bits.
    ///
    /// Changing it between runs makes old hashes incomparable.
    pub hash_size: u32,
    /// Include hidden files and directories
    pub include_hidden: bool,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Override the accepted file extensions
    pub extensions: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_side: 1024,
            aspect_min: 0.5,
            aspect_max: 2.0,
            sharpness_target: 150.0,
            noise_ceiling: 12.0,
            weights: ScoreWeights::default(),
            pass_threshold: 95.0,
            dedupe_tol: 8,
            hash_size: 16,
            include_hidden: false,
            follow_symlinks: false,
            max_depth: None,
            extensions: None,
        }
    }
}

impl ScanConfig {
    /// Scoring parameters derived from this configuration
    pub fn scoring(&self) -> ScoringParams {
        ScoringParams {
            target_sharpness: self.sharpness_target,
            noise_ceiling: self.noise_ceiling,
            weights: self.weights,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_side == 0 {
            return Err(invalid("min_side", "must be positive"));
        }
        if !(self.aspect_min > 0.0 && self.aspect_max.is_finite()) {
            return Err(invalid("aspect_min", "aspect bounds must be positive and finite"));
        }
        if self.aspect_min > self.aspect_max {
            return Err(invalid("aspect_min", "must not exceed aspect_max"));
        }
        if !(self.sharpness_target > 0.0) {
            return Err(invalid("sharpness_target", "must be positive"));
        }
        if !(self.noise_ceiling > 0.0) {
            return Err(invalid("noise_ceiling", "must be positive"));
        }
        let w = self.weights;
        if [w.sharpness, w.contrast, w.noise]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(invalid("weights", "must be finite and non-negative"));
        }
        if !self.pass_threshold.is_finite() {
            return Err(invalid("pass_threshold", "must be finite"));
        }
        if self.hash_size < 2 {
            return Err(invalid("hash_size", "must be at least 2"));
        }
        Ok(())
    }
}

/// Settings for the export phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Minimum score for the training selection gate
    pub select_min_score: f64,
    /// Comma-separated include globs (empty = everything)
    pub include_globs: String,
    /// Comma-separated exclude globs
    pub exclude_globs: String,
    /// Output side lengths
    pub buckets: Vec<u32>,
    /// Try to repair images that did not pass
    pub autofix: bool,
    /// Face/saliency square crops instead of letterboxing
    pub intelligent_crop: bool,
    /// Upscaling beyond this factor is skipped during auto-fix
    pub max_upscale_factor: f64,
    /// Light smoothing of JPEG sources before auto-fix
    pub deblock: bool,
    /// JPEG quality of written images
    pub jpeg_quality: u8,
    /// Metadata written into accepted images
    pub metadata: MetadataTemplate,
    /// Best-effort captioning through an external endpoint
    pub caption: CaptionSettings,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            select_min_score: 90.0,
            include_globs: String::new(),
            exclude_globs: String::new(),
            buckets: vec![1024, 1152, 1216],
            autofix: true,
            intelligent_crop: true,
            max_upscale_factor: 2.0,
            deblock: true,
            jpeg_quality: 95,
            metadata: MetadataTemplate::default(),
            caption: CaptionSettings::default(),
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buckets.is_empty() {
            return Err(invalid("buckets", "at least one bucket is required"));
        }
        if self.buckets.contains(&0) {
            return Err(invalid("buckets", "bucket sides must be positive"));
        }
        if !(self.max_upscale_factor >= 1.0) {
            return Err(invalid("max_upscale_factor", "must be at least 1.0"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality", "must be within 1..=100"));
        }
        // Surfaces malformed patterns before any task starts.
        self.selection_gate().map(|_| ())
    }

    /// Compile the include/exclude/min-score selection gate
    pub fn selection_gate(&self) -> Result<SelectionGate, ConfigError> {
        SelectionGate::from_lists(
            &self.include_globs,
            &self.exclude_globs,
            self.select_min_score,
        )
    }
}

/// Everything a full scan + export run needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub scan: ScanConfig,
    pub export: ExportConfig,
    /// Worker pool size (None = one per CPU core)
    pub workers: Option<usize>,
}

impl CurationConfig {
    /// Default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dataset-curator")
            .join("settings.json")
    }

    /// Load settings; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Persist settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan.validate()?;
        self.export.validate()?;
        if self.workers == Some(0) {
            return Err(invalid("workers", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        assert!(CurationConfig::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_reference_thresholds() {
        let config = CurationConfig::default();
        assert_eq!(config.scan.min_side, 1024);
        assert_eq!(config.scan.pass_threshold, 95.0);
        assert_eq!(config.scan.hash_size, 16);
        assert_eq!(config.export.buckets, vec![1024, 1152, 1216]);
        assert_eq!(config.export.select_min_score, 90.0);
    }

    #[test]
    fn inverted_aspect_bounds_rejected() {
        let scan = ScanConfig {
            aspect_min: 2.0,
            aspect_max: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            scan.validate(),
            Err(ConfigError::InvalidValue { field: "aspect_min", .. })
        ));
    }

    #[test]
    fn empty_buckets_rejected() {
        let export = ExportConfig {
            buckets: Vec::new(),
            ..Default::default()
        };
        assert!(export.validate().is_err());
    }

    #[test]
    fn malformed_glob_rejected_up_front() {
        let export = ExportConfig {
            exclude_globs: "*/screens/[".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            export.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CurationConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.scan.dedupe_tol, 8);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"scan": {"pass_threshold": 80.0}, "workers": 2}"#).unwrap();

        let config = CurationConfig::load(&path).unwrap();
        assert_eq!(config.scan.pass_threshold, 80.0);
        assert_eq!(config.scan.min_side, 1024);
        assert_eq!(config.workers, Some(2));
        assert!(config.export.autofix);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            CurationConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut config = CurationConfig::default();
        config.export.exclude_globs = "*memes*".to_string();

        config.save(&path).unwrap();
        let loaded = CurationConfig::load(&path).unwrap();
        assert_eq!(loaded.export.exclude_globs, "*memes*");
    }
}
