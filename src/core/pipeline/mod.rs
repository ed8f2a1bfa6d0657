//! # Pipeline Module
//!
//! Orchestrates the two curation phases over a bounded rayon pool.
//!
//! ## Phases
//! 1. **Scan**: one task per discovered file (normalize, score, gate, hash),
//!    then a barrier, then duplicate resolution exactly once
//! 2. **Export**: keeper selection up front, then one task per item
//!    (auto-fix, framing, captions, staged writes), then the manifest
//!
//! Per-item failures are logged, reported as events and left out of the
//! results. Every task ticks the shared [`Progress`](crate::events::Progress)
//! counter, so it always reaches its total. Only configuration problems
//! abort a run.

mod cancel;
mod categorize;
mod export;
mod scan;
mod staging;

pub use cancel::CancellationToken;
pub use categorize::{categorize, passes_as_scanned, select_bucket, FixVerdict};
pub use export::{prepare_output, ExportOrchestrator, ExportReport, MANIFEST_FILE, REPORTS_DIR};
pub use scan::{scan_image, ScanOrchestrator, ScanReport};
pub use staging::{write_atomic, StagedFiles};

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{ConfigError, CurationError};

/// Worker pool for one run; `None` means one thread per core
fn build_pool(workers: Option<usize>) -> Result<ThreadPool, ConfigError> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    builder.build().map_err(|e| ConfigError::InvalidValue {
        field: "workers",
        reason: e.to_string(),
    })
}

/// Run one per-item task, turning a panic into an error for that item so
/// it cannot unwind through the pool.
fn isolate<T, E>(item: &str, task: impl FnOnce() -> Result<T, E>) -> Result<T, CurationError>
where
    E: Into<CurationError>,
{
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(CurationError::Panicked {
                item: item.to_string(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn panicking_task_becomes_error() {
        let result: Result<(), CurationError> =
            isolate("a.png", || -> Result<(), DecodeError> { panic!("boom") });
        match result {
            Err(CurationError::Panicked { item, message }) => {
                assert_eq!(item, "a.png");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn task_errors_pass_through() {
        let result = isolate("a.png", || {
            Err::<(), _>(ConfigError::InvalidValue {
                field: "workers",
                reason: "zero".to_string(),
            })
        });
        assert!(matches!(result, Err(CurationError::Config(_))));
    }
}
