//! # CLI Module
//!
//! Command-line interface for the dataset curator.
//!
//! ## Usage
//! ```bash
//! # Score and deduplicate a folder
//! curate scan ~/datasets/raw
//!
//! # Full run into an output folder
//! curate export ~/datasets/raw --out ~/datasets/curated --exclude "*memes*"
//!
//! # One image, with the full breakdown
//! curate score ~/datasets/raw/a.jpg
//!
//! # Crops suggested by a local vision model
//! curate vlm-crop a.jpg b.jpg --out crops --prompt "the person's face"
//! ```

mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread;

use dataset_curator::config::{CurationConfig, ExportConfig, ScanConfig};
use dataset_curator::core::caption::{vlm_crop, LmStudioClient};
use dataset_curator::core::hasher::PerceptualHasher;
use dataset_curator::core::pipeline::{
    scan_image, ExportOrchestrator, ExportReport, ScanOrchestrator, ScanReport,
};
use dataset_curator::core::scanner::{ImageFormat, SourceImage};
use dataset_curator::error::Result;
use dataset_curator::events::{
    Event, EventChannel, EventReceiver, EventSender, ExportEvent, PipelineEvent, ScanEvent,
};

/// Dataset Curator - from a messy folder to a training-ready dataset
#[derive(Parser, Debug)]
#[command(name = "curate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: <config dir>/dataset-curator/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (default: one per CPU core)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score, gate and deduplicate every image under a directory
    Scan {
        /// Source directory
        dir: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,

        #[command(flatten)]
        scan: ScanOverrides,
    },

    /// Scan, then write the curated dataset into an output folder
    Export {
        /// Source directory
        dir: PathBuf,

        /// Output folder (category subfolders are created inside)
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        scan: ScanOverrides,

        #[command(flatten)]
        export: ExportOverrides,
    },

    /// Print the quality breakdown and geometry verdict of one image
    Score {
        file: PathBuf,

        #[command(flatten)]
        scan: ScanOverrides,
    },

    /// Crop images to a box suggested by the captioning endpoint
    VlmCrop {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Folder for the crops
        #[arg(short, long)]
        out: PathBuf,

        /// What to put the box around
        #[arg(short, long, default_value = "the main subject")]
        prompt: String,
    },
}

/// Scan threshold overrides on top of the settings file
#[derive(Args, Debug, Default)]
struct ScanOverrides {
    /// Minimum shorter side in pixels
    #[arg(long)]
    min_side: Option<u32>,

    /// Composite score needed to pass
    #[arg(long)]
    pass_threshold: Option<f64>,

    /// Hamming distance at or below which images are duplicates
    #[arg(long)]
    dedupe_tol: Option<u32>,

    /// Include hidden files and folders
    #[arg(long)]
    include_hidden: bool,
}

impl ScanOverrides {
    fn apply(&self, config: &mut ScanConfig) {
        if let Some(v) = self.min_side {
            config.min_side = v;
        }
        if let Some(v) = self.pass_threshold {
            config.pass_threshold = v;
        }
        if let Some(v) = self.dedupe_tol {
            config.dedupe_tol = v;
        }
        if self.include_hidden {
            config.include_hidden = true;
        }
    }
}

/// Export overrides on top of the settings file
#[derive(Args, Debug, Default)]
struct ExportOverrides {
    /// Minimum score for training selection
    #[arg(long)]
    select_min_score: Option<f64>,

    /// Comma-separated include globs
    #[arg(long)]
    include: Option<String>,

    /// Comma-separated exclude globs
    #[arg(long)]
    exclude: Option<String>,

    /// Output bucket sides, e.g. 1024,1152,1216
    #[arg(long, value_delimiter = ',')]
    buckets: Option<Vec<u32>>,

    /// Do not try to repair images that did not pass
    #[arg(long)]
    no_autofix: bool,

    /// Letterbox instead of face/saliency cropping
    #[arg(long)]
    no_intelligent_crop: bool,

    /// Caption accepted images through the configured endpoint
    #[arg(long)]
    caption: bool,
}

impl ExportOverrides {
    fn apply(&self, config: &mut ExportConfig) {
        if let Some(v) = self.select_min_score {
            config.select_min_score = v;
        }
        if let Some(v) = &self.include {
            config.include_globs = v.clone();
        }
        if let Some(v) = &self.exclude {
            config.exclude_globs = v.clone();
        }
        if let Some(v) = &self.buckets {
            config.buckets = v.clone();
        }
        if self.no_autofix {
            config.autofix = false;
        }
        if self.no_intelligent_crop {
            config.intelligent_crop = false;
        }
        if self.caption {
            config.caption.enabled = true;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Aligned table with colors
    Table,
    /// JSON output for scripting
    Json,
    /// One `STATUS name` line per item
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    dataset_curator::init_tracing(cli.verbose);

    let path = cli.config.clone().unwrap_or_else(CurationConfig::default_path);
    let mut config = CurationConfig::load(&path)?;
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }

    match cli.command {
        Commands::Scan { dir, output, scan } => {
            scan.apply(&mut config.scan);
            config.validate()?;
            run_scan(&config, &dir, output, cli.verbose)
        }
        Commands::Export {
            dir,
            out,
            scan,
            export,
        } => {
            scan.apply(&mut config.scan);
            export.apply(&mut config.export);
            config.validate()?;
            run_export(&config, &dir, &out, cli.verbose)
        }
        Commands::Score { file, scan } => {
            scan.apply(&mut config.scan);
            config.validate()?;
            run_score(&config.scan, &file)
        }
        Commands::VlmCrop { files, out, prompt } => run_vlm_crop(&config, &files, &out, &prompt),
    }
}

fn run_scan(config: &CurationConfig, dir: &Path, format: OutputFormat, verbose: bool) -> Result<()> {
    let term = Term::stderr();
    let show_progress = matches!(format, OutputFormat::Table);
    if show_progress {
        output::print_header(&term);
    }

    let (sender, receiver) = EventChannel::new();
    let bar = show_progress.then(new_progress_bar);
    let listener = spawn_listener(receiver, bar.clone(), verbose);

    let result = ScanOrchestrator::new(config.scan.clone())
        .with_workers(config.workers)
        .run_with_events(dir, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    listener.join().ok();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let report = result?;
    match format {
        OutputFormat::Table => output::print_scan_table(&term, &report, verbose),
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Minimal => output::print_scan_minimal(&report),
    }
    Ok(())
}

fn run_export(config: &CurationConfig, dir: &Path, out: &Path, verbose: bool) -> Result<()> {
    let term = Term::stderr();
    output::print_header(&term);

    let (sender, receiver) = EventChannel::new();
    let bar = new_progress_bar();
    let listener = spawn_listener(receiver, Some(bar.clone()), verbose);

    let result = scan_then_export(config, dir, out, &sender);

    drop(sender);
    listener.join().ok();
    bar.finish_and_clear();

    let (scan, export) = result?;
    output::print_export_summary(&term, &scan, &export);
    Ok(())
}

fn scan_then_export(
    config: &CurationConfig,
    dir: &Path,
    out: &Path,
    sender: &EventSender,
) -> Result<(ScanReport, ExportReport)> {
    let scan = ScanOrchestrator::new(config.scan.clone())
        .with_workers(config.workers)
        .run_with_events(dir, sender)?;

    let export = ExportOrchestrator::new(config.scan.clone(), config.export.clone())
        .with_workers(config.workers)
        .run_with_events(&scan.items, out, sender)?;

    Ok((scan, export))
}

fn run_score(config: &ScanConfig, file: &Path) -> Result<()> {
    let source = SourceImage {
        path: file.to_path_buf(),
        name: file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string()),
        size: std::fs::metadata(file).map(|m| m.len()).unwrap_or(0),
        format: ImageFormat::from_path(file),
    };
    let item = scan_image(&source, config, &PerceptualHasher::new(config.hash_size))?;
    output::print_score(&Term::stdout(), &item, config);
    Ok(())
}

fn run_vlm_crop(config: &CurationConfig, files: &[PathBuf], out: &Path, prompt: &str) -> Result<()> {
    let client = LmStudioClient::new(&config.export.caption);
    let report = vlm_crop(files, prompt, out, &client)?;

    let term = Term::stdout();
    for path in &report.written {
        term.write_line(&format!("{} {}", style("✓").green(), path.display())).ok();
    }
    for (path, reason) in &report.skipped {
        term.write_line(&format!(
            "{} {} ({})",
            style("-").yellow(),
            path.display(),
            style(reason).dim()
        ))
        .ok();
    }
    Ok(())
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar
}

/// Drive the progress bar from engine events until every sender is gone
fn spawn_listener(
    receiver: EventReceiver,
    bar: Option<ProgressBar>,
    verbose: bool,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(bar) = bar.as_ref() else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    bar.set_message(phase.to_string());
                }
                Event::Scan(ScanEvent::Discovered { total }) => {
                    bar.set_position(0);
                    bar.set_length(total as u64);
                }
                Event::Export(ExportEvent::Started { total, .. }) => {
                    bar.set_position(0);
                    bar.set_length(total as u64);
                }
                Event::Scan(ScanEvent::Progress(p)) | Event::Export(ExportEvent::Progress(p)) => {
                    bar.set_position(p.done as u64);
                    if verbose {
                        bar.set_message(
                            p.current_path
                                .file_name()
                                .unwrap_or_default()
                                .to_string_lossy()
                                .to_string(),
                        );
                    }
                }
                Event::Scan(ScanEvent::ItemFailed { path, message })
                | Event::Export(ExportEvent::ItemFailed { path, message }) => {
                    if verbose {
                        bar.println(format!(
                            "{} {}: {}",
                            style("!").yellow(),
                            path.display(),
                            message
                        ));
                    }
                }
                _ => {}
            }
        }
    })
}
