//! Terminal rendering of scan and export results.

use console::{style, StyledObject, Term};
use serde::Serialize;

use dataset_curator::config::ScanConfig;
use dataset_curator::core::item::{ExportCategory, ScanItem, ScanStatus};
use dataset_curator::core::pipeline::{ExportReport, ScanReport};

pub fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Dataset Curator").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn status_label(status: ScanStatus) -> StyledObject<String> {
    let label = format!("{:<9}", status.to_string());
    match status {
        ScanStatus::Pass => style(label).green(),
        ScanStatus::Fail => style(label).red(),
        ScanStatus::Duplicate => style(label).yellow(),
    }
}

pub fn print_scan_table(term: &Term, report: &ScanReport, verbose: bool) {
    term.write_line(&format!(
        "{} Scan Complete",
        style("✓").green().bold()
    ))
    .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} of {} images scanned in {:.1}s",
        style(report.items.len()).cyan(),
        report.total_files,
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} pass, {} fail, {} duplicates",
        style(report.count(ScanStatus::Pass)).green(),
        style(report.count(ScanStatus::Fail)).red(),
        style(report.count(ScanStatus::Duplicate)).yellow()
    ))
    .ok();
    if !report.errors.is_empty() {
        term.write_line(&format!(
            "  {} files could not be read",
            style(report.errors.len()).red()
        ))
        .ok();
    }
    if report.cancelled {
        term.write_line(&format!("  {}", style("Cancelled before every file was scanned").yellow()))
            .ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {}",
        style(format!(
            "{:<9} {:>6} {:>6} {:>6} {:>6} {:>11}  {}",
            "STATUS", "FINAL", "SHARP", "CONTR", "NOISE", "SIZE", "NAME"
        ))
        .bold()
    ))
    .ok();
    for item in &report.items {
        let mut line = format!(
            "  {} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>11}  {}",
            status_label(item.status),
            item.score.final_score,
            item.score.sharpness,
            item.score.contrast,
            item.score.noise,
            format!("{}x{}", item.width, item.height),
            item.name
        );
        if let Some(root) = &item.duplicate_of {
            line.push_str(&format!(" {}", style(format!("(duplicate of {})", root)).dim()));
        } else if let Some(reason) = &item.fail_reason {
            line.push_str(&format!(" {}", style(format!("({})", reason)).dim()));
        }
        term.write_line(&line).ok();
    }

    if verbose && !report.errors.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Unreadable files:").bold().underlined()))
            .ok();
        for error in &report.errors {
            term.write_line(&format!("  {}", style(error).dim())).ok();
        }
    }
}

pub fn print_scan_minimal(report: &ScanReport) {
    for item in &report.items {
        println!("{} {}", item.status, item.name);
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Could not serialize results: {}", e),
    }
}

pub fn print_export_summary(term: &Term, scan: &ScanReport, export: &ExportReport) {
    term.write_line(&format!(
        "{} Export Complete",
        style("✓").green().bold()
    ))
    .ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} images scanned, {} exported in {:.1}s",
        style(scan.items.len()).cyan(),
        style(export.rows.len()).cyan(),
        (scan.duration_ms + export.duration_ms) as f64 / 1000.0
    ))
    .ok();
    term.write_line("").ok();

    for category in ExportCategory::ALL {
        let count = export.count(category);
        let label = format!("{:<11}", category.dir_name());
        let label = if category.is_accepted() {
            style(label).green()
        } else {
            style(label).dim()
        };
        term.write_line(&format!("  {} {}", label, count)).ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} selected for training",
        style(export.selected()).cyan().bold()
    ))
    .ok();
    let failures = scan.errors.len() + export.errors.len();
    if failures > 0 {
        term.write_line(&format!(
            "  {} items skipped (unreadable or unwritable)",
            style(failures).red()
        ))
        .ok();
    }
    if scan.cancelled || export.cancelled {
        term.write_line(&format!("  {}", style("Run was cancelled; output is partial").yellow()))
            .ok();
    }
    term.write_line(&format!(
        "  manifest: {}",
        style(export.manifest_path.display()).dim()
    ))
    .ok();
}

pub fn print_score(term: &Term, item: &ScanItem, config: &ScanConfig) {
    let score = &item.score;
    term.write_line(&format!("{}", style(&item.name).bold())).ok();
    term.write_line(&format!(
        "  size       {}x{} ({:.2} MP)",
        item.width, item.height, item.megapixels
    ))
    .ok();
    term.write_line(&format!(
        "  sharpness  {:>6.1}  (laplacian variance {:.1}, target {:.1})",
        score.sharpness, score.laplacian_variance, config.sharpness_target
    ))
    .ok();
    term.write_line(&format!("  contrast   {:>6.1}", score.contrast)).ok();
    term.write_line(&format!(
        "  noise      {:>6.1}  (std {:.2}, ceiling {:.1})",
        score.noise, score.noise_std, config.noise_ceiling
    ))
    .ok();

    let final_line = format!("{:>6.1}", score.final_score);
    let final_styled = if score.final_score >= config.pass_threshold {
        style(final_line).green().bold()
    } else {
        style(final_line).red().bold()
    };
    term.write_line(&format!(
        "  final      {}  (pass threshold {:.1})",
        final_styled, config.pass_threshold
    ))
    .ok();

    match &item.fail_reason {
        None => term.write_line(&format!("  geometry   {}", style("ok").green())).ok(),
        Some(reason) => term
            .write_line(&format!("  geometry   {} ({})", style("FAIL").red(), reason))
            .ok(),
    };
}
