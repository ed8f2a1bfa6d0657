//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the curation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scan phase events
    Scan(ScanEvent),
    /// Export phase events
    Export(ExportEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the scan phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Discovery has started
    Started { root: PathBuf },
    /// Discovery finished; `total` items will be scored
    Discovered { total: usize },
    /// One scan task finished (successfully or not)
    Progress(ItemProgress),
    /// A file could not be scanned; it is omitted from the results
    ItemFailed { path: PathBuf, message: String },
    /// All tasks finished and duplicates were resolved
    Completed {
        scanned: usize,
        failed: usize,
        duplicates: usize,
    },
}

/// Events during the export phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExportEvent {
    /// Export has started
    Started { total: usize, out_dir: PathBuf },
    /// One export task finished (successfully or not)
    Progress(ItemProgress),
    /// An item could not be exported; it gets no manifest row
    ItemFailed { path: PathBuf, message: String },
    /// The manifest was written
    ManifestWritten { path: PathBuf, rows: usize },
    /// All tasks finished
    Completed { exported: usize, failed: usize },
}

/// Per-task progress tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProgress {
    /// Tasks finished so far
    pub done: usize,
    /// Total tasks in this phase
    pub total: usize,
    /// The item whose task just finished
    pub current_path: PathBuf,
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Phase finished
    Completed { phase: PipelinePhase, duration_ms: u64 },
    /// Pipeline was cancelled; unfinished items were abandoned
    Cancelled,
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Discovering,
    Scoring,
    Deduplicating,
    Exporting,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Discovering => write!(f, "Discovering"),
            PipelinePhase::Scoring => write!(f, "Scoring"),
            PipelinePhase::Deduplicating => write!(f, "Deduplicating"),
            PipelinePhase::Exporting => write!(f, "Exporting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Scan(ScanEvent::Progress(ItemProgress {
            done: 3,
            total: 10,
            current_path: PathBuf::from("/raw/a.png"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Scan(ScanEvent::Progress(p)) => {
                assert_eq!(p.done, 3);
                assert_eq!(p.total, 10);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn phase_display() {
        assert_eq!(PipelinePhase::Deduplicating.to_string(), "Deduplicating");
    }
}
