//! # Selection Module
//!
//! The training-selection gate: independent of PASS/FAIL, it decides which
//! images are flagged for training from their path and score.
//!
//! ## Rules
//! 1. Any exclude pattern matches => not selected
//! 2. Include patterns given and none matches => not selected
//! 3. Otherwise selected iff `score >= min_score`
//!
//! Patterns are comma-separated globs, matched case-insensitively against
//! the source path with forward slashes. `*` also crosses directory
//! separators, so `*memes*` matches anywhere in the path.

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled include/exclude/min-score gate
#[derive(Debug, Clone)]
pub struct SelectionGate {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    min_score: f64,
}

/// Everything the gate looked at, for the per-item report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    /// First exclude pattern that matched
    pub excluded_by: Option<String>,
    /// Whether include patterns were configured at all
    pub include_required: bool,
    /// First include pattern that matched
    pub include_matched: Option<String>,
    pub score: f64,
    pub threshold: f64,
    pub selected: bool,
}

impl SelectionGate {
    /// Compile comma-separated pattern lists
    pub fn from_lists(include: &str, exclude: &str, min_score: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            min_score,
        })
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn evaluate(&self, path: &Path, score: f64) -> GateOutcome {
        let normalized = normalize_path(path);

        let excluded_by = self
            .exclude
            .iter()
            .find(|p| p.matches_with(&normalized, MATCH_OPTIONS))
            .map(|p| p.as_str().to_string());
        let include_matched = self
            .include
            .iter()
            .find(|p| p.matches_with(&normalized, MATCH_OPTIONS))
            .map(|p| p.as_str().to_string());
        let include_required = !self.include.is_empty();

        let selected = excluded_by.is_none()
            && (!include_required || include_matched.is_some())
            && score >= self.min_score;

        GateOutcome {
            excluded_by,
            include_required,
            include_matched,
            score,
            threshold: self.min_score,
            selected,
        }
    }

    pub fn is_selected(&self, path: &Path, score: f64) -> bool {
        self.evaluate(path, score).selected
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.excluded_by {
            Some(pattern) => writeln!(f, "excluded by: {}", pattern)?,
            None => writeln!(f, "excluded by: -")?,
        }
        match (self.include_required, &self.include_matched) {
            (false, _) => writeln!(f, "include: (no include patterns)")?,
            (true, Some(pattern)) => writeln!(f, "include: matched {}", pattern)?,
            (true, None) => writeln!(f, "include: no pattern matched")?,
        }
        writeln!(f, "score: {:.1} (threshold {:.1})", self.score, self.threshold)?;
        write!(f, "selected: {}", self.selected)
    }
}

fn compile(list: &str) -> Result<Vec<Pattern>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(include: &str, exclude: &str) -> SelectionGate {
        SelectionGate::from_lists(include, exclude, 90.0).unwrap()
    }

    #[test]
    fn exclude_beats_perfect_score() {
        let outcome = gate("", "*/screens/*").evaluate(Path::new("/raw/screens/a.png"), 100.0);
        assert!(!outcome.selected);
        assert_eq!(outcome.excluded_by.as_deref(), Some("*/screens/*"));
    }

    #[test]
    fn include_list_must_match() {
        let g = gate("*portraits*", "");
        assert!(g.is_selected(Path::new("/raw/portraits/a.jpg"), 95.0));
        assert!(!g.is_selected(Path::new("/raw/landscape/a.jpg"), 95.0));
    }

    #[test]
    fn empty_lists_fall_through_to_score() {
        let g = gate("", "");
        assert!(g.is_selected(Path::new("a.jpg"), 90.0));
        assert!(!g.is_selected(Path::new("a.jpg"), 89.9));
    }

    #[test]
    fn matching_ignores_case_and_backslashes() {
        let g = gate("", "*MEMES*");
        assert!(!g.is_selected(Path::new(r"C:\raw\memes\a.jpg"), 99.0));
        assert!(!g.is_selected(Path::new("/raw/Memes/a.jpg"), 99.0));
    }

    #[test]
    fn lists_are_trimmed_and_skip_blanks() {
        let g = gate(" , *a* ,, ", "");
        assert!(g.evaluate(Path::new("/x/a.jpg"), 99.0).include_required);
        assert!(g.is_selected(Path::new("/x/a.jpg"), 99.0));
    }

    #[test]
    fn malformed_pattern_is_config_error() {
        let err = SelectionGate::from_lists("", "ok*, */screens/[", 90.0).unwrap_err();
        match err {
            ConfigError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "*/screens/["),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn outcome_display_mentions_threshold() {
        let text = gate("", "").evaluate(Path::new("a.jpg"), 42.0).to_string();
        assert!(text.contains("threshold 90.0"));
        assert!(text.contains("selected: false"));
    }
}
