//! Scan phase: score and hash every image in parallel, then resolve
//! duplicates once all tasks are done.

use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::{build_pool, isolate, CancellationToken};
use crate::config::ScanConfig;
use crate::core::dedup;
use crate::core::hasher::PerceptualHasher;
use crate::core::item::{ScanItem, ScanStatus};
use crate::core::normalize::normalize_file;
use crate::core::quality::{geometry_failure, score};
use crate::core::scanner::{ImageScanner, SourceImage, WalkConfig, WalkDirScanner};
use crate::error::{CurationError, DecodeError, ScanError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase, Progress, ScanEvent};

/// Result of a scan run
#[derive(Debug, Serialize)]
pub struct ScanReport {
    /// Successfully scanned items, sorted by name, duplicates resolved
    pub items: Vec<ScanItem>,
    /// Files that could not be read or decoded (non-fatal)
    pub errors: Vec<String>,
    /// Files discovered
    pub total_files: usize,
    pub duration_ms: u64,
    /// Some items were abandoned because the run was cancelled
    pub cancelled: bool,
}

impl ScanReport {
    pub fn count(&self, status: ScanStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

enum TaskOutcome {
    Scanned(ScanItem),
    Failed(PathBuf, String),
    Abandoned,
}

/// Runs the scan phase over one source directory
pub struct ScanOrchestrator {
    config: ScanConfig,
    workers: Option<usize>,
    cancel: CancellationToken,
    progress: Progress,
}

impl ScanOrchestrator {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            workers: None,
            cancel: CancellationToken::new(),
            progress: Progress::new(),
        }
    }

    /// Worker pool size; `None` uses one thread per core
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Counter that can be polled while `run` is in progress
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn run(&self, root: &Path) -> Result<ScanReport, CurationError> {
        self.run_with_events(root, &null_sender())
    }

    pub fn run_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanReport, CurationError> {
        let start_time = Instant::now();
        self.config.validate()?;
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled.into());
        }
        let pool = build_pool(self.workers)?;

        events.send(Event::Pipeline(PipelineEvent::Started));

        // Phase 1: Discovery
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Discovering,
        }));
        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let scanner = WalkDirScanner::new(WalkConfig::from(&self.config));
        let discovery = scanner.discover_with_events(root, events)?;
        let mut errors: Vec<String> = discovery.errors.iter().map(|e| e.to_string()).collect();
        let images = discovery.images;
        let total = images.len();

        // Phase 2: Scoring
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scoring,
        }));
        self.progress.reset(total);

        let hasher = PerceptualHasher::new(self.config.hash_size);
        let outcomes: Vec<TaskOutcome> = pool.install(|| {
            images
                .par_iter()
                .map(|image| {
                    let outcome = if self.cancel.is_cancelled() {
                        TaskOutcome::Abandoned
                    } else {
                        match isolate(&image.name, || scan_image(image, &self.config, &hasher)) {
                            Ok(item) => TaskOutcome::Scanned(item),
                            Err(e) => {
                                warn!("Skipping {}: {}", image.path.display(), e);
                                events.send(Event::Scan(ScanEvent::ItemFailed {
                                    path: image.path.clone(),
                                    message: e.to_string(),
                                }));
                                TaskOutcome::Failed(image.path.clone(), e.to_string())
                            }
                        }
                    };

                    let done = self.progress.tick();
                    events.scan_tick(done, total, &image.path);
                    outcome
                })
                .collect()
        });

        // Barrier: every task has finished here.
        let mut items = Vec::with_capacity(total);
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Scanned(item) => items.push(item),
                TaskOutcome::Failed(path, message) => {
                    errors.push(format!("{}: {}", path.display(), message))
                }
                TaskOutcome::Abandoned => cancelled = true,
            }
        }
        events.send(Event::Pipeline(PipelineEvent::Completed {
            phase: PipelinePhase::Scoring,
            duration_ms: start_time.elapsed().as_millis() as u64,
        }));

        // Phase 3: Dedup, exactly once over the full set
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Deduplicating,
        }));
        let duplicates = dedup::resolve(&mut items, self.config.dedupe_tol);

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let failed = items.iter().filter(|i| !i.geometry_passed()).count();
        info!(
            "Scanned {} of {} files: {} geometry failures, {} duplicates",
            items.len(),
            total,
            failed,
            duplicates
        );

        events.send(Event::Scan(ScanEvent::Completed {
            scanned: items.len(),
            failed,
            duplicates,
        }));
        events.send(Event::Pipeline(PipelineEvent::Completed {
            phase: PipelinePhase::Deduplicating,
            duration_ms,
        }));
        if cancelled {
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
        }

        Ok(ScanReport {
            items,
            errors,
            total_files: total,
            duration_ms,
            cancelled,
        })
    }
}

/// Normalize, score, gate and hash one source image
pub fn scan_image(
    image: &SourceImage,
    config: &ScanConfig,
    hasher: &PerceptualHasher,
) -> Result<ScanItem, DecodeError> {
    let raster = normalize_file(&image.path)?;
    let (width, height) = raster.dimensions();

    let quality = score(&raster, &config.scoring());
    let fail_reason = geometry_failure(
        width,
        height,
        config.min_side,
        config.aspect_min,
        config.aspect_max,
    );
    let hash = hasher.hash(&DynamicImage::ImageRgb8(raster));

    let status = if fail_reason.is_some() {
        ScanStatus::Fail
    } else {
        ScanStatus::Pass
    };

    Ok(ScanItem {
        name: image.name.clone(),
        path: image.path.clone(),
        width,
        height,
        megapixels: (width as f64 * height as f64) / 1_000_000.0,
        score: quality,
        hash,
        status,
        duplicate_of: None,
        fail_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::PerceptualHash;
    use crate::core::scanner::ImageFormat;
    use crate::events::EventChannel;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn small_config() -> ScanConfig {
        ScanConfig {
            min_side: 64,
            ..Default::default()
        }
    }

    fn textured(width: u32, height: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13 + seed * 31) % 256) as u8;
            Rgb([v, v.wrapping_add(40), 255 - v])
        })
    }

    #[test]
    fn empty_directory_scans_nothing() {
        let dir = TempDir::new().unwrap();
        let report = ScanOrchestrator::new(small_config()).run(dir.path()).unwrap();
        assert!(report.items.is_empty());
        assert_eq!(report.total_files, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn missing_root_is_fatal() {
        let result = ScanOrchestrator::new(small_config()).run(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(CurationError::Scan(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_scanning() {
        let dir = TempDir::new().unwrap();
        let config = ScanConfig {
            min_side: 0,
            ..Default::default()
        };
        let result = ScanOrchestrator::new(config).run(dir.path());
        assert!(matches!(result, Err(CurationError::Config(_))));
    }

    #[test]
    fn corrupt_file_is_reported_and_progress_completes() {
        let dir = TempDir::new().unwrap();
        textured(96, 96, 1).save(dir.path().join("good.png")).unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();

        let orchestrator = ScanOrchestrator::new(small_config()).with_workers(Some(2));
        let progress = orchestrator.progress();
        let report = orchestrator.run(dir.path()).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("broken.jpg"));
        assert_eq!(progress.done(), 2);
        assert!(progress.is_complete());
    }

    #[test]
    fn geometry_failure_sets_status_and_reason() {
        let dir = TempDir::new().unwrap();
        textured(200, 40, 2).save(dir.path().join("wide.png")).unwrap();

        let report = ScanOrchestrator::new(small_config()).run(dir.path()).unwrap();
        let item = &report.items[0];
        assert_eq!(item.status, ScanStatus::Fail);
        assert!(item.fail_reason.as_deref().unwrap().contains("short side 40"));
    }

    #[test]
    fn identical_images_resolve_to_one_duplicate() {
        let dir = TempDir::new().unwrap();
        let image = textured(128, 128, 3);
        image.save(dir.path().join("a.png")).unwrap();
        image.save(dir.path().join("b.png")).unwrap();

        let report = ScanOrchestrator::new(small_config()).run(dir.path()).unwrap();
        assert_eq!(report.items[0].name, "a.png");
        assert_eq!(report.items[0].status, ScanStatus::Pass);
        assert_eq!(report.items[1].status, ScanStatus::Duplicate);
        assert_eq!(report.items[1].duplicate_of.as_deref(), Some("a.png"));
        assert_eq!(report.count(ScanStatus::Duplicate), 1);
    }

    #[test]
    fn run_with_cancelled_token_does_not_start() {
        let dir = TempDir::new().unwrap();
        textured(96, 96, 4).save(dir.path().join("a.png")).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = ScanOrchestrator::new(small_config())
            .with_cancellation(token)
            .run(dir.path());

        assert!(matches!(
            result,
            Err(CurationError::Scan(ScanError::Cancelled))
        ));
    }

    #[test]
    fn events_track_every_task() {
        let dir = TempDir::new().unwrap();
        for i in 0..3 {
            textured(80, 80, i).save(dir.path().join(format!("{}.png", i))).unwrap();
        }

        let (sender, receiver) = EventChannel::new();
        ScanOrchestrator::new(small_config())
            .run_with_events(dir.path(), &sender)
            .unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        let ticks = events
            .iter()
            .filter(|e| matches!(e, Event::Scan(ScanEvent::Progress(_))))
            .count();
        assert_eq!(ticks, 3);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Scan(ScanEvent::Completed { scanned: 3, .. }))));
    }

    #[test]
    fn scan_image_records_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.png");
        textured(120, 90, 5).save(&path).unwrap();

        let source = SourceImage {
            path: path.clone(),
            name: "x.png".to_string(),
            size: 0,
            format: ImageFormat::Png,
        };
        let item = scan_image(&source, &small_config(), &PerceptualHasher::new(16)).unwrap();
        assert_eq!((item.width, item.height), (120, 90));
        assert!((item.megapixels - 0.0108).abs() < 1e-9);
        assert_eq!(item.hash.bit_count(), 256);
    }
}
