//! `manifest.csv`: one row per exported item.

use serde::Serialize;
use std::io::Write;

use crate::core::item::{ExportCategory, ScanStatus};

pub const MANIFEST_HEADER: &str =
    "name,source,status,category,bucket,destination,selected_for_training,final_score,duplicate_of";

/// A manifest line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    pub name: String,
    pub source: String,
    pub status: ScanStatus,
    pub category: ExportCategory,
    pub bucket: u32,
    /// Written image, relative to the output folder
    pub destination: String,
    pub selected_for_training: bool,
    pub final_score: f64,
    pub duplicate_of: Option<String>,
}

/// Write the manifest as CSV
///
/// Rows are written in the order given. Score has one decimal place.
pub fn write_manifest<W: Write>(rows: &[ManifestRow], mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "{}", MANIFEST_HEADER)?;

    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{:.1},{}",
            csv_field(&row.name),
            csv_field(&row.source),
            row.status,
            row.category,
            row.bucket,
            csv_field(&row.destination),
            row.selected_for_training,
            row.final_score,
            csv_field(row.duplicate_of.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

/// Quote a field when it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
