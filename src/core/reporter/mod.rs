//! # Reporter Module
//!
//! Written records of an export run.
//!
//! - `manifest.csv`: one row per exported item, in task completion order
//! - `reports/<stem>.txt`: why an item landed where it did (scan status,
//!   selection gate inputs, before/after scores, bucket)

mod item_report;
mod manifest;

pub use item_report::{FixSummary, ItemReport};
pub use manifest::{write_manifest, ManifestRow, MANIFEST_HEADER};
