//! Export phase: categorize, repair, frame and write every scanned item.

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::categorize::{categorize, passes_as_scanned, select_bucket, FixVerdict};
use super::staging::{write_atomic, StagedFiles};
use super::{build_pool, isolate, CancellationToken};
use crate::config::{ExportConfig, ScanConfig};
use crate::core::caption::{client_for, render_name, slugify, CaptionClient};
use crate::core::crop::{bucket_square, resize_lanczos, square_crop, FaceDetector, SkinRegionDetector};
use crate::core::dedup::Keepers;
use crate::core::item::{ExportCategory, ExportDecision, ScanItem};
use crate::core::metadata::embed_exif;
use crate::core::normalize::normalize_file;
use crate::core::reporter::{write_manifest, FixSummary, ItemReport, ManifestRow};
use crate::core::restore::{auto_fix, deblock, AutoFixOutcome, AutoFixParams};
use crate::core::scanner::ImageFormat;
use crate::core::selection::SelectionGate;
use crate::error::{ConfigError, CurationError, ExportError, TransformError};
use crate::events::{
    null_sender, Event, EventSender, ExportEvent, PipelineEvent, PipelinePhase, Progress,
};

pub const REPORTS_DIR: &str = "reports";
pub const MANIFEST_FILE: &str = "manifest.csv";

/// Result of an export run
#[derive(Debug, Serialize)]
pub struct ExportReport {
    /// Manifest rows, in task completion order
    pub rows: Vec<ManifestRow>,
    /// Items that could not be exported (non-fatal)
    pub errors: Vec<String>,
    pub manifest_path: PathBuf,
    pub duration_ms: u64,
    pub cancelled: bool,
}

impl ExportReport {
    pub fn count(&self, category: ExportCategory) -> usize {
        self.rows.iter().filter(|r| r.category == category).count()
    }

    pub fn selected(&self) -> usize {
        self.rows.iter().filter(|r| r.selected_for_training).count()
    }
}

/// Read-only state shared by all export tasks
struct ExportContext<'a> {
    out_dir: &'a Path,
    keepers: Keepers,
    gate: SelectionGate,
}

/// Runs the export phase into an output folder
pub struct ExportOrchestrator {
    scan: ScanConfig,
    export: ExportConfig,
    workers: Option<usize>,
    cancel: CancellationToken,
    progress: Progress,
    detector: Arc<dyn FaceDetector>,
    captions: Arc<dyn CaptionClient>,
}

impl ExportOrchestrator {
    pub fn new(scan: ScanConfig, export: ExportConfig) -> Self {
        let captions: Arc<dyn CaptionClient> = Arc::from(client_for(&export.caption));
        Self {
            scan,
            export,
            workers: None,
            cancel: CancellationToken::new(),
            progress: Progress::new(),
            detector: Arc::new(SkinRegionDetector::default()),
            captions,
        }
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_caption_client(mut self, client: Arc<dyn CaptionClient>) -> Self {
        self.captions = client;
        self
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn run(&self, items: &[ScanItem], out_dir: &Path) -> Result<ExportReport, CurationError> {
        self.run_with_events(items, out_dir, &null_sender())
    }

    pub fn run_with_events(
        &self,
        items: &[ScanItem],
        out_dir: &Path,
        events: &EventSender,
    ) -> Result<ExportReport, CurationError> {
        let start_time = Instant::now();
        self.scan.validate()?;
        self.export.validate()?;
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled.into());
        }
        let gate = self.export.selection_gate()?;
        let pool = build_pool(self.workers)?;
        prepare_output(out_dir)?;

        // Keeper choice needs whole groups, so it runs before any task.
        let keepers = Keepers::compute(items);
        let mut ordered: Vec<&ScanItem> = items.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        let stems = unique_stems(&ordered);

        let ctx = ExportContext {
            out_dir,
            keepers,
            gate,
        };
        let total = ordered.len();

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Exporting,
        }));
        events.send(Event::Export(ExportEvent::Started {
            total,
            out_dir: out_dir.to_path_buf(),
        }));
        self.progress.reset(total);

        let rows: Mutex<Vec<ManifestRow>> = Mutex::new(Vec::with_capacity(total));
        let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let abandoned = AtomicBool::new(false);

        pool.install(|| {
            (0..total).into_par_iter().for_each(|index| {
                let item = ordered[index];
                if self.cancel.is_cancelled() {
                    abandoned.store(true, Ordering::SeqCst);
                } else {
                    match isolate(&item.name, || self.export_item(&ctx, item, index + 1, &stems[index])) {
                        Ok(row) => rows.lock().unwrap_or_else(PoisonError::into_inner).push(row),
                        Err(e) => {
                            warn!("Export of {} failed: {}", item.name, e);
                            events.send(Event::Export(ExportEvent::ItemFailed {
                                path: item.path.clone(),
                                message: e.to_string(),
                            }));
                            errors
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(format!("{}: {}", item.name, e));
                        }
                    }
                }

                let done = self.progress.tick();
                events.export_tick(done, total, &item.path);
            })
        });

        let rows = rows.into_inner().unwrap_or_else(PoisonError::into_inner);
        let errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        let cancelled = abandoned.into_inner();

        // The manifest is written once, after every task finished.
        let manifest_path = out_dir.join(MANIFEST_FILE);
        let mut manifest = Vec::new();
        write_manifest(&rows, &mut manifest).map_err(|source| ExportError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        write_atomic(&manifest_path, &manifest)?;
        events.send(Event::Export(ExportEvent::ManifestWritten {
            path: manifest_path.clone(),
            rows: rows.len(),
        }));

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Exported {} of {} items to {} ({} failed)",
            rows.len(),
            total,
            out_dir.display(),
            errors.len()
        );
        events.send(Event::Export(ExportEvent::Completed {
            exported: rows.len(),
            failed: errors.len(),
        }));
        events.send(Event::Pipeline(PipelineEvent::Completed {
            phase: PipelinePhase::Exporting,
            duration_ms,
        }));
        if cancelled {
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
        }

        Ok(ExportReport {
            rows,
            errors,
            manifest_path,
            duration_ms,
            cancelled,
        })
    }

    /// One export task. Everything it writes is staged and committed
    /// together, or not at all.
    fn export_item(
        &self,
        ctx: &ExportContext<'_>,
        item: &ScanItem,
        index: usize,
        stem: &str,
    ) -> Result<ManifestRow, CurationError> {
        let mut raster = normalize_file(&item.path)?;
        if self.export.deblock && ImageFormat::from_path(&item.path) == ImageFormat::Jpeg {
            raster = deblock(&raster);
        }
        let pass_threshold = self.scan.pass_threshold;
        let redundant = ctx.keepers.is_redundant(&item.name);

        let fix = if !redundant
            && self.export.autofix
            && !passes_as_scanned(item, redundant, pass_threshold)
        {
            self.try_fix(item, &raster)
        } else {
            None
        };
        let verdict = fix.as_ref().map(|f| FixVerdict { post: f.post });
        let category = categorize(item, redundant, verdict.as_ref(), pass_threshold);
        let (output, bucket) = self.frame(category, &raster, fix.as_ref())?;

        let score = match (&fix, category) {
            (Some(f), ExportCategory::Rescued) => f.post.final_score,
            _ => item.score.final_score,
        };
        let gate = ctx.gate.evaluate(&item.path, score);
        let decision = ExportDecision {
            accepted: category.is_accepted(),
            bucket,
            category,
            selected_for_training: gate.selected && category.is_accepted(),
        };
        debug!("{} -> {:?}", item.name, decision);

        let captions = if decision.accepted && self.export.caption.enabled {
            self.captions_for(item, category)
        } else {
            CaptionResult::default()
        };
        let stem = match (&captions.description, self.export.caption.rename_pattern.is_empty()) {
            (Some(description), false) => {
                let rendered = render_name(
                    &self.export.caption.rename_pattern,
                    &self.export.caption.prefix,
                    index,
                    &slugify(description),
                    stem,
                );
                if rendered.trim().is_empty() {
                    stem.to_string()
                } else {
                    rendered
                }
            }
            _ => stem.to_string(),
        };

        let category_dir = ctx.out_dir.join(category.dir_name());
        let image_path = category_dir.join(format!("{}.jpg", stem));
        let destination = format!("{}/{}.jpg", category.dir_name(), stem);

        let mut staged = StagedFiles::new();
        staged.stage(image_path.clone(), &self.encode(&output, &image_path, decision.accepted)?)?;

        if self.export.caption.save_captions && (captions.caption.is_some() || captions.tags.is_some()) {
            let sidecar = [captions.caption.as_deref(), captions.tags.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("\n");
            staged.stage(category_dir.join(format!("{}.txt", stem)), sidecar.as_bytes())?;
        }

        let report = ItemReport {
            name: item.name.clone(),
            source: item.path.display().to_string(),
            status: item.status,
            fail_reason: item.fail_reason.clone(),
            duplicate_of: item.duplicate_of.clone(),
            gate,
            scan_score: item.score,
            fix: fix.as_ref().map(|f| FixSummary {
                pre: f.pre,
                post: f.post,
                stages: f.stages.clone(),
            }),
            category,
            bucket,
            destination: destination.clone(),
            caption: captions.caption,
            tags: captions.tags,
            generated_at: Local::now(),
        };
        let report_path = ctx.out_dir.join(REPORTS_DIR).join(format!("{}.txt", stem));
        staged.stage(report_path, report.render().as_bytes())?;

        staged.commit()?;

        Ok(ManifestRow {
            name: item.name.clone(),
            source: item.path.display().to_string(),
            status: item.status,
            category,
            bucket,
            destination,
            selected_for_training: decision.selected_for_training,
            final_score: score,
            duplicate_of: item.duplicate_of.clone(),
        })
    }

    /// Auto-fix aimed at the bucket the repaired image will land in.
    /// A failed repair is logged and treated as no repair.
    fn try_fix(&self, item: &ScanItem, raster: &RgbImage) -> Option<AutoFixOutcome> {
        let (width, height) = raster.dimensions();
        let shorter = width.min(height);
        let reachable = shorter >= self.scan.min_side
            || (self.scan.min_side as f64 / shorter.max(1) as f64) <= self.export.max_upscale_factor;
        let expected_side = if reachable {
            shorter.max(self.scan.min_side)
        } else {
            shorter
        };

        let params = AutoFixParams {
            scoring: self.scan.scoring(),
            pass_threshold: self.scan.pass_threshold,
            min_side: self.scan.min_side,
            target_side: select_bucket(&self.export.buckets, expected_side),
            max_upscale_factor: self.export.max_upscale_factor,
            intelligent_crop: self.export.intelligent_crop,
        };

        match auto_fix(raster, &params, self.detector.as_ref()) {
            Ok(outcome) => {
                debug!(
                    "Auto-fix {}: {:.1} -> {:.1}",
                    item.name, outcome.pre.final_score, outcome.post.final_score
                );
                Some(outcome)
            }
            Err(e) => {
                warn!("Auto-fix of {} failed: {}", item.name, e);
                None
            }
        }
    }

    /// Output raster and its bucket for a category
    fn frame(
        &self,
        category: ExportCategory,
        raster: &RgbImage,
        fix: Option<&AutoFixOutcome>,
    ) -> Result<(RgbImage, u32), TransformError> {
        let buckets = &self.export.buckets;
        match (category, fix) {
            (ExportCategory::Rescued, Some(fix)) => {
                let (w, h) = fix.raster.dimensions();
                let bucket = select_bucket(buckets, w.min(h));
                let output = if w == bucket && h == bucket {
                    fix.raster.clone()
                } else if w == h {
                    resize_lanczos(&fix.raster, bucket, bucket)?
                } else {
                    bucket_square(&fix.raster, bucket)?
                };
                Ok((output, bucket))
            }
            (ExportCategory::Pass, _) => {
                let bucket = select_bucket(buckets, raster.width().min(raster.height()));
                let output = if self.export.intelligent_crop {
                    square_crop(raster, bucket, self.detector.as_ref())?
                } else {
                    bucket_square(raster, bucket)?
                };
                Ok((output, bucket))
            }
            _ => {
                let bucket = select_bucket(buckets, raster.width().min(raster.height()));
                Ok((bucket_square(raster, bucket)?, bucket))
            }
        }
    }

    fn encode(&self, raster: &RgbImage, target: &Path, accepted: bool) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.export.jpeg_quality);
        raster
            .write_with_encoder(encoder)
            .map_err(|e| ExportError::Encode {
                path: target.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !accepted || self.export.metadata.is_empty() {
            return Ok(bytes);
        }
        match embed_exif(&bytes, &self.export.metadata) {
            Ok(tagged) => Ok(tagged),
            Err(e) => {
                warn!("Writing metadata to {} failed: {}", target.display(), e);
                Ok(bytes)
            }
        }
    }

    /// Best-effort caption, tags and description; failures become `None`
    fn captions_for(&self, item: &ScanItem, category: ExportCategory) -> CaptionResult {
        let settings = &self.export.caption;
        let prompt = match category {
            ExportCategory::Rescued => &settings.caption_prompt_rescued,
            _ => &settings.caption_prompt_pass,
        };
        let client = self.captions.as_ref();

        let caption = non_empty(client.caption(&item.path, prompt), "caption", &item.name);
        let tags = non_empty(client.tags(&item.path, &settings.tags_prompt), "tags", &item.name);
        let description = if settings.rename_pattern.is_empty() {
            None
        } else {
            non_empty(client.describe(&item.path), "description", &item.name)
        };

        CaptionResult {
            caption,
            tags,
            description,
        }
    }
}

#[derive(Debug, Default)]
struct CaptionResult {
    caption: Option<String>,
    tags: Option<String>,
    description: Option<String>,
}

fn non_empty<E: std::fmt::Display>(result: Result<String, E>, what: &str, name: &str) -> Option<String> {
    match result {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("No {} for {}: {}", what, name, e);
            None
        }
    }
}

/// Create every category folder plus `reports` before any task starts
pub fn prepare_output(out_dir: &Path) -> Result<(), ConfigError> {
    let dirs = ExportCategory::ALL
        .iter()
        .map(|c| c.dir_name())
        .chain(std::iter::once(REPORTS_DIR));
    for name in dirs {
        let dir = out_dir.join(name);
        std::fs::create_dir_all(&dir)
            .map_err(|source| ConfigError::OutputDirectory { path: dir, source })?;
    }
    Ok(())
}

/// Output stems from item names, made unique across the run.
///
/// `people/a.jpg` becomes `people-a`; clashes get `-2`, `-3`, ...
fn unique_stems(ordered: &[&ScanItem]) -> Vec<String> {
    let mut taken = HashSet::new();
    ordered
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let without_ext = Path::new(&item.name).with_extension("");
            let base = slugify(&without_ext.to_string_lossy().replace(['/', '\\', '.'], " "));
            let base = if base.is_empty() {
                format!("image-{:05}", i + 1)
            } else {
                base
            };

            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{}-{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}
