//! # Dataset Curator
//!
//! Turns a large, mixed folder of images into a training-ready dataset.
//!
//! ## What it does
//! - Scores every image for sharpness, contrast and noise
//! - Finds near-duplicates and keeps the best of each group
//! - Repairs images that fell short, then re-measures them
//! - Writes square, bucketed, metadata-tagged JPEGs plus a manifest
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - The curation engine
//! - `config` - Scan/export settings and the settings file
//! - `events` - Progress counter and event channel
//! - `error` - Typed errors

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::{CurationConfig, ExportConfig, ScanConfig};
pub use error::{CurationError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library
///
/// Call once from the entry point. `RUST_LOG` wins when set; otherwise the
/// level is `info`, or `debug` when `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
