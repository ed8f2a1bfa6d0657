//! # Error Module
//!
//! Typed errors for the curation engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, field names, what went wrong
//! - **Per-item errors stay per-item** - the orchestrators catch them at the
//!   task boundary; only configuration errors stop a whole run

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CurationError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Captioning service error: {0}")]
    Caption(#[from] CaptionError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing {item} panicked: {message}")]
    Panicked { item: String, message: String },
}

/// Errors that occur while discovering source images
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// The image could not be turned into a raster. Fatal to that item only.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open image file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {reason}")]
    Malformed { reason: String },

    #[error("Image is empty or corrupted")]
    Empty,
}

/// A colour or geometric operation failed
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Colour profile conversion failed: {0}")]
    Profile(String),

    #[error("Resize failed: {0}")]
    Resize(String),

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Metadata embedding failed: {0}")]
    Metadata(String),
}

/// Errors comparing perceptual hashes
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Hash widths differ ({left} vs {right} bits); hashes from different widths are not comparable")]
    WidthMismatch { left: u32, right: u32 },
}

/// Failures of the external caption/tag/bbox service.
///
/// These never stop curation; callers fall back to empty output.
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Captioning is disabled")]
    Disabled,

    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to read image {path} for upload: {source}")]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors writing an item's outputs. Fatal to that item's export only.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Export was cancelled")]
    Cancelled,
}

/// Configuration problems, discovered before any task starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid JSON: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Cannot use output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/datasets/raw"),
        };
        assert!(error.to_string().contains("/datasets/raw"));
    }

    #[test]
    fn config_error_names_field() {
        let error = ConfigError::InvalidValue {
            field: "aspect_min",
            reason: "must not exceed aspect_max".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("aspect_min"));
        assert!(message.contains("aspect_max"));
    }

    #[test]
    fn hash_width_mismatch_mentions_both_widths() {
        let error = HashError::WidthMismatch { left: 256, right: 64 };
        let message = error.to_string();
        assert!(message.contains("256"));
        assert!(message.contains("64"));
    }

    #[test]
    fn decode_error_converts_into_top_level() {
        let error: CurationError = DecodeError::Empty.into();
        assert!(matches!(error, CurationError::Decode(DecodeError::Empty)));
    }
}
