//! Pollable done/total counter shared between an orchestrator and its caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared progress counter.
///
/// Every task ticks exactly once, whether it succeeded, failed or was
/// abandoned after cancellation, so `done` always reaches `total`.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new phase with `total` tasks.
    pub fn reset(&self, total: usize) {
        self.done.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Mark one task finished and return the new done count.
    pub fn tick(&self) -> usize {
        self.done.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.done() >= self.total()
    }

    /// Completion as a fraction in [0, 1]; an empty phase counts as complete.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        (self.done() as f64 / total as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn parallel_ticks_reach_total() {
        let progress = Progress::new();
        progress.reset(500);

        (0..500).into_par_iter().for_each(|_| {
            progress.tick();
        });

        assert_eq!(progress.done(), 500);
        assert!(progress.is_complete());
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn clones_share_state() {
        let progress = Progress::new();
        progress.reset(2);
        let observer = progress.clone();

        progress.tick();
        assert_eq!(observer.done(), 1);
        assert!(!observer.is_complete());
    }

    #[test]
    fn empty_phase_is_complete() {
        let progress = Progress::new();
        progress.reset(0);
        assert!(progress.is_complete());
        assert_eq!(progress.fraction(), 1.0);
    }
}
